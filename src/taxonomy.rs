//! Shared vocabulary: the two severity tiers and the namespace/element
//! constants the other modules agree on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// SDC4 data-model target namespace. The restriction-only rule applies to
/// schemas declaring exactly this namespace.
pub const SDC4_NAMESPACE: &str = "https://semanticdatacharter.com/ns/sdc4/";

/// SDC4 metadata ontology namespace.
pub const SDC4_META_NAMESPACE: &str = "https://semanticdatacharter.com/ontology/sdc4-meta/";

/// W3C XML Schema namespace.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Data-bearing elements in SDC4 schemas.
pub const DATA_BEARING_ELEMENTS: &[&str] = &[
    "xdstring-value",
    "xdcount-value",
    "xdquantity-value",
    "xdboolean-value",
    "xdfile-value",
    "xdlink-value",
    "xdtemporal-value",
    "xdordinal-value",
    "xdratio-value",
    "xdinterval-value",
    "xdtoken-value",
];

/// Structural/metadata elements. A fault in one of these is never
/// recoverable by downstream repair tooling.
pub const STRUCTURAL_ELEMENTS: &[&str] = &[
    "label",
    "act",
    "vtb",
    "vte",
    "tr",
    "modified",
    "latitude",
    "longitude",
    "normal-status",
    "magnitude-status",
    "accuracy_margin",
    "precision_digits",
];

/// Two-tier severity of a validation diagnostic.
///
/// * `Structural` (tier 1): unknown elements, wrong nesting, cardinality. Reject.
/// * `Semantic` (tier 2): type, pattern, enumeration, range. Report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorTier {
    Structural,
    Semantic,
}

impl ErrorTier {
    /// Wire value used in reports (`"structural"` / `"semantic"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorTier::Structural => "structural",
            ErrorTier::Semantic => "semantic",
        }
    }

    /// Human label including the tier number.
    pub fn label(self) -> &'static str {
        match self {
            ErrorTier::Structural => "Structural errors (Tier 1)",
            ErrorTier::Semantic => "Semantic errors (Tier 2)",
        }
    }
}

impl fmt::Display for ErrorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace settings handed to the components that need them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Namespace whose schemas must follow the restriction-only rule.
    pub data_model_namespace: String,
    /// Namespace of XML Schema constructs (`extension`, `complexType`, ...).
    pub xsd_namespace: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            data_model_namespace: SDC4_NAMESPACE.to_string(),
            xsd_namespace: XSD_NAMESPACE.to_string(),
        }
    }
}

pub fn is_data_bearing(local_name: &str) -> bool {
    DATA_BEARING_ELEMENTS.contains(&local_name)
}

pub fn is_structural_element(local_name: &str) -> bool {
    STRUCTURAL_ELEMENTS.contains(&local_name)
}

/// Local name of the last step of an XPath-like location.
///
/// Handles `/DataModel/xdstring-value`, `/ns:DataModel/ns:xdstring-value[1]`
/// and Clark notation (`{uri}name`).
pub fn element_local_name(xpath: &str) -> Option<&str> {
    let last = xpath.trim_matches('/').rsplit('/').next()?;
    let last = match last.find('[') {
        Some(idx) => &last[..idx],
        None => last,
    };
    let last = match last.rfind('}') {
        Some(idx) => &last[idx + 1..],
        None => last,
    };
    let last = last.rsplit(':').next().unwrap_or(last);
    if last.is_empty() { None } else { Some(last) }
}
