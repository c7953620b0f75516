//! Restriction-only linting of data-model schemas.
//!
//! Schemas in the data-model namespace may narrow types with
//! `xsd:restriction` but never broaden them with `xsd:extension`. Each
//! `extension` occurrence is reported once, attributed to its innermost
//! enclosing `complexType`/`simpleType`.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::schema_tree::{NodeId, SchemaTree};
use crate::taxonomy::Vocabulary;

/// Placeholder used when an `extension` has no `base` attribute.
pub const UNKNOWN_BASE: &str = "unknown";

/// Placeholder used when the enclosing type has no `name` attribute.
pub const ANONYMOUS_TYPE: &str = "anonymous type";

/// Closing statement of every compliance failure message.
pub const PRINCIPLE: &str = "SDC4 Principle: Data models must use xsd:restriction (not xsd:extension) \
     to guarantee global interoperability and enforce separation of structure and semantics.";

/// One forbidden `extension` occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceIssue {
    /// Innermost enclosing type name, [`ANONYMOUS_TYPE`] when it is unnamed,
    /// `None` when the construct is not inside any type definition.
    pub enclosing_type: Option<String>,
    /// Value of the `base` attribute.
    pub base_type: String,
    /// Source line of the `extension` element, when known.
    pub line: Option<u32>,
}

impl ComplianceIssue {
    pub fn new(enclosing_type: Option<String>, base_type: String) -> Self {
        Self {
            enclosing_type,
            base_type,
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ComplianceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.enclosing_type {
            Some(type_name) => write!(
                f,
                "xsd:extension found in type '{}' extending '{}'. \
                 SDC4 data models must use xsd:restriction only, never xsd:extension. \
                 This guarantees global interoperability and enforces separation of \
                 structure (reference model) and semantics (data model).",
                type_name, self.base_type
            ),
            None => write!(
                f,
                "xsd:extension found extending '{}'. \
                 SDC4 data models must use xsd:restriction only to guarantee \
                 global interoperability.",
                self.base_type
            ),
        }
    }
}

/// Outcome of a compliance check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub issues: Vec<ComplianceIssue>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issue messages, one per occurrence.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ComplianceIssue::message).collect()
    }

    /// `(is_compliant, messages)` pair.
    pub fn into_parts(self) -> (bool, Vec<String>) {
        (self.is_compliant(), self.messages())
    }

    /// Turn a non-compliant report into [`Error::ComplianceViolation`].
    pub fn into_result(self, schema: Option<&Path>) -> Result<()> {
        if self.is_compliant() {
            return Ok(());
        }
        Err(Error::ComplianceViolation {
            schema: schema.map(Path::to_path_buf),
            issues: self.issues,
        })
    }
}

/// Full failure message: header, bulleted issues, principle statement.
pub fn render_violation(schema: Option<&Path>, issues: &[ComplianceIssue]) -> String {
    let header = match schema {
        Some(path) => format!("Schema '{}' violates SDC4 compliance:", path.display()),
        None => "Schema violates SDC4 compliance:".to_string(),
    };
    let bullets = issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}\n\n{}", header, bullets, PRINCIPLE)
}

/// Walks a schema tree looking for forbidden `extension` constructs.
#[derive(Debug, Clone, Default)]
pub struct ComplianceChecker {
    vocabulary: Vocabulary,
}

impl ComplianceChecker {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Check an already parsed schema. Never fails.
    pub fn check(&self, tree: &SchemaTree) -> ComplianceReport {
        if tree.target_namespace() != Some(self.vocabulary.data_model_namespace.as_str()) {
            debug!(
                schema = tree.source_name(),
                target_namespace = ?tree.target_namespace(),
                "schema outside data-model namespace, compliance check skipped"
            );
            return ComplianceReport::default();
        }

        let xsd = self.vocabulary.xsd_namespace.as_str();
        let issues: Vec<ComplianceIssue> = tree
            .find_all(xsd, "extension")
            .map(|id| {
                let node = tree.node(id);
                let base_type = node.attribute("base").unwrap_or(UNKNOWN_BASE).to_string();
                let enclosing_type = self.enclosing_type(tree, id).map(|type_id| {
                    tree.node(type_id)
                        .attribute("name")
                        .unwrap_or(ANONYMOUS_TYPE)
                        .to_string()
                });
                ComplianceIssue::new(enclosing_type, base_type).at_line(node.line)
            })
            .collect();

        for issue in &issues {
            warn!(
                schema = tree.source_name(),
                line = issue.line,
                base = %issue.base_type,
                enclosing = issue.enclosing_type.as_deref().unwrap_or("-"),
                "xsd:extension in data-model schema"
            );
        }

        ComplianceReport { issues }
    }

    /// Read, parse and check a schema file.
    pub fn check_path(&self, path: &Path) -> Result<ComplianceReport> {
        let tree = SchemaTree::from_path(path)?;
        Ok(self.check(&tree))
    }

    /// Parse and check schema text.
    pub fn check_str(&self, text: &str, source_name: &str) -> Result<ComplianceReport> {
        let tree = SchemaTree::parse(text, source_name)?;
        Ok(self.check(&tree))
    }

    /// Like [`check_path`](Self::check_path), failing with
    /// [`Error::ComplianceViolation`] when any issue is found.
    pub fn assert_path(&self, path: &Path) -> Result<()> {
        self.check_path(path)?.into_result(Some(path))
    }

    fn enclosing_type(&self, tree: &SchemaTree, id: NodeId) -> Option<NodeId> {
        let xsd = self.vocabulary.xsd_namespace.as_str();
        tree.ancestors(id).find(|&ancestor| {
            let node = tree.node(ancestor);
            node.is(xsd, "complexType") || node.is(xsd, "simpleType")
        })
    }
}

/// Check a schema file with the default vocabulary, returning
/// `(is_compliant, issue messages)`.
pub fn check_compliance_path(path: &Path) -> Result<(bool, Vec<String>)> {
    Ok(ComplianceChecker::default().check_path(path)?.into_parts())
}

/// [`check_compliance_path`] for schema text held in memory.
pub fn check_compliance_str(text: &str, source_name: &str) -> Result<(bool, Vec<String>)> {
    Ok(ComplianceChecker::default()
        .check_str(text, source_name)?
        .into_parts())
}

/// Fail with [`Error::ComplianceViolation`] unless the schema file is compliant.
pub fn assert_compliance_path(path: &Path) -> Result<()> {
    ComplianceChecker::default().assert_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::SDC4_NAMESPACE;

    fn schema(target_namespace: &str, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
            xmlns:sdc4="{ns}"
            targetNamespace="{ns}">
{body}
</xsd:schema>"#,
            ns = target_namespace,
            body = body
        )
    }

    const EXTENDED_TYPE: &str = r#"
  <xsd:complexType name="PatientNameExtended">
    <xsd:complexContent>
      <xsd:extension base="sdc4:XdStringType">
        <xsd:sequence>
          <xsd:element name="nickname" type="xsd:string"/>
        </xsd:sequence>
      </xsd:extension>
    </xsd:complexContent>
  </xsd:complexType>"#;

    fn check(text: &str) -> ComplianceReport {
        ComplianceChecker::default().check_str(text, "test.xsd").unwrap()
    }

    #[test]
    fn test_restriction_only_schema_is_compliant() {
        let text = schema(
            SDC4_NAMESPACE,
            r#"
  <xsd:simpleType name="Code">
    <xsd:restriction base="xsd:string">
      <xsd:maxLength value="10"/>
    </xsd:restriction>
  </xsd:simpleType>"#,
        );
        let report = check(&text);
        assert!(report.is_compliant());
        assert_eq!(report.into_parts(), (true, vec![]));
    }

    #[test]
    fn test_extension_reports_type_and_base() {
        let report = check(&schema(SDC4_NAMESPACE, EXTENDED_TYPE));
        let (compliant, messages) = report.into_parts();

        assert!(!compliant);
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert!(message.contains("xsd:extension"));
        assert!(message.contains("PatientNameExtended"));
        assert!(message.contains("XdStringType"));
        assert!(message.contains("xsd:restriction"));
        assert!(message.to_lowercase().contains("separation"));
        assert!(message.to_lowercase().contains("global interoperability"));
    }

    #[test]
    fn test_other_namespace_is_ignored() {
        let report = check(&schema("http://other.example/", EXTENDED_TYPE));
        assert_eq!(report.into_parts(), (true, vec![]));
    }

    #[test]
    fn test_missing_target_namespace_is_ignored() {
        let text = r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:complexType name="T">
    <xsd:complexContent><xsd:extension base="B"/></xsd:complexContent>
  </xsd:complexType>
</xsd:schema>"#;
        assert!(check(text).is_compliant());
    }

    #[test]
    fn test_nested_extension_attributed_to_innermost_type() {
        let text = schema(
            SDC4_NAMESPACE,
            r#"
  <xsd:complexType name="Outer">
    <xsd:sequence>
      <xsd:element name="child">
        <xsd:complexType name="Inner">
          <xsd:simpleContent>
            <xsd:extension base="xsd:string"/>
          </xsd:simpleContent>
        </xsd:complexType>
      </xsd:element>
    </xsd:sequence>
  </xsd:complexType>"#,
        );
        let report = check(&text);

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].enclosing_type.as_deref(), Some("Inner"));
        assert!(!report.messages()[0].contains("'Outer'"));
    }

    #[test]
    fn test_anonymous_enclosing_type() {
        let text = schema(
            SDC4_NAMESPACE,
            r#"
  <xsd:element name="note">
    <xsd:complexType>
      <xsd:simpleContent>
        <xsd:extension base="xsd:string"/>
      </xsd:simpleContent>
    </xsd:complexType>
  </xsd:element>"#,
        );
        let report = check(&text);
        assert_eq!(
            report.issues[0].enclosing_type.as_deref(),
            Some(ANONYMOUS_TYPE)
        );
        assert!(report.messages()[0].contains("'anonymous type'"));
    }

    #[test]
    fn test_extension_outside_type_uses_short_message() {
        let text = schema(
            SDC4_NAMESPACE,
            r#"
  <xsd:group name="G">
    <xsd:sequence>
      <xsd:extension/>
    </xsd:sequence>
  </xsd:group>"#,
        );
        let report = check(&text);

        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.enclosing_type, None);
        assert_eq!(issue.base_type, UNKNOWN_BASE);
        assert_eq!(
            issue.message(),
            "xsd:extension found extending 'unknown'. SDC4 data models must use \
             xsd:restriction only to guarantee global interoperability."
        );
    }

    #[test]
    fn test_every_occurrence_reported_without_dedup() {
        let body = format!(
            "{}{}",
            EXTENDED_TYPE,
            EXTENDED_TYPE.replace("PatientNameExtended", "OtherExtended")
        );
        let report = check(&schema(SDC4_NAMESPACE, &body));

        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].base_type, report.issues[1].base_type);
        assert!(report.issues[0].line < report.issues[1].line);
    }

    #[test]
    fn test_custom_vocabulary_namespace() {
        let checker = ComplianceChecker::new(Vocabulary {
            data_model_namespace: "urn:custom".to_string(),
            ..Vocabulary::default()
        });
        let report = checker
            .check_str(&schema("urn:custom", EXTENDED_TYPE), "custom.xsd")
            .unwrap();
        assert!(!report.is_compliant());
    }

    #[test]
    fn test_into_result_formats_violation() {
        let report = check(&schema(SDC4_NAMESPACE, EXTENDED_TYPE));
        let error = report
            .into_result(Some(Path::new("invalid.xsd")))
            .unwrap_err();
        let message = error.to_string();

        assert!(message.contains("violates SDC4 compliance"));
        assert!(message.contains("xsd:extension"));
        assert!(message.contains("PatientNameExtended"));
        assert!(message.contains("SDC4 Principle:"));
        assert!(message.contains("separation of structure and semantics"));
        assert!(message.to_lowercase().contains("global interoperability"));
    }

    #[test]
    fn test_parse_failure_is_error_not_issue() {
        let result = ComplianceChecker::default().check_str("<schema><unclosed>", "bad.xsd");
        assert!(matches!(result, Err(Error::SchemaParse { .. })));
    }
}
