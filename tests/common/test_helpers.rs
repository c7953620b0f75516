use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.fixtures_dir.join("schemas")
    }

    pub fn xml_valid_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml").join("valid")
    }

    pub fn xml_invalid_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml").join("invalid")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.fixtures_dir.join("configs")
    }

    /// Restriction-only population data model.
    pub fn population_schema(&self) -> PathBuf {
        self.schemas_dir().join("dm-population.xsd")
    }

    /// Restriction-only `Patient` schema with qualified children.
    pub fn patient_schema(&self) -> PathBuf {
        self.schemas_dir().join("valid_sdc4_schema.xsd")
    }

    pub fn extension_schema(&self) -> PathBuf {
        self.schemas_dir().join("invalid_sdc4_schema_with_extension.xsd")
    }

    pub fn foreign_extension_schema(&self) -> PathBuf {
        self.schemas_dir().join("non_sdc4_schema_with_extension.xsd")
    }

    pub fn malformed_schema(&self) -> PathBuf {
        self.schemas_dir().join("malformed.xsd")
    }

    pub fn valid_population(&self) -> PathBuf {
        self.xml_valid_dir().join("population.xml")
    }

    pub fn valid_patient(&self) -> PathBuf {
        self.xml_valid_dir().join("patient.xml")
    }

    pub fn invalid(&self, name: &str) -> PathBuf {
        self.xml_invalid_dir().join(name)
    }

    pub fn malformed_xml(&self) -> PathBuf {
        self.fixtures_dir
            .join("xml")
            .join("malformed")
            .join("not_well_formed.xml")
    }
}

pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

pub fn read_to_string(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

pub const SDC4_NS: &str = "https://semanticdatacharter.com/ns/sdc4/";

/// Population instance with the given extra content spliced in after
/// `dm-encoding`.
pub fn population_with(extra: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sdc4:dm-population xmlns:sdc4="{SDC4_NS}">
    <dm-label>StatePopulation</dm-label>
    <dm-language>en-US</dm-language>
    <dm-encoding>utf-8</dm-encoding>
    {extra}
</sdc4:dm-population>
"#
    )
}

/// `population_with(extra)` declared and encoded as ISO-8859-1, with a
/// non-ASCII comment so the bytes are not valid UTF-8.
pub fn latin1_population_with(extra: &str) -> Vec<u8> {
    let text = population_with(extra).replacen(
        r#"encoding="UTF-8""#,
        r#"encoding="ISO-8859-1""#,
        1,
    );
    let mut bytes = text.into_bytes();
    bytes.extend_from_slice(b"<!-- caf\xE9 -->\n");
    bytes
}

pub fn write_bytes(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}
