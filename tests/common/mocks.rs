use mockall::mock;

use sdc4_validator::{CompiledSchema, RawErrorKind, RawValidationError, Result};

// Engine stand-in for tests that pin classification without libxml2.
mock! {
    pub Schema {}

    impl CompiledSchema for Schema {
        fn iter_errors(&self, document: &[u8], name: &str) -> Result<Vec<RawValidationError>>;
    }
}

/// Schema mock that reports the same errors for every document.
pub fn schema_returning(errors: Vec<RawValidationError>) -> MockSchema {
    let mut schema = MockSchema::new();
    schema
        .expect_iter_errors()
        .returning(move |_, _| Ok(errors.clone()));
    schema
}

pub fn unexpected_child(tag: &str) -> RawValidationError {
    RawValidationError::new(RawErrorKind::Children {
        invalid_tag: Some(tag.to_string()),
    })
    .with_path(format!("/dm-population/{}", tag))
    .with_reason(format!("Element '{}': This element is not expected.", tag))
}

pub fn incomplete_content(element: &str) -> RawValidationError {
    RawValidationError::new(RawErrorKind::Children { invalid_tag: None })
        .with_path(format!("/{}", element))
        .with_reason(format!(
            "The content of element '{}' is not complete. Missing child element(s).",
            element
        ))
}

pub fn bad_value(path: &str, reason: &str) -> RawValidationError {
    RawValidationError::new(RawErrorKind::Decode)
        .with_path(path)
        .with_reason(reason)
}
