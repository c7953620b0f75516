//! Schema-driven XML/JSON conversion over the fixture data models.

mod common;

use common::test_helpers::{
    SDC4_NS, TestFixtures, latin1_population_with, read_to_string, write_bytes,
};
use serde_json::{Value, json};
use sdc4_validator::{Converter, Error, Validator, json_to_xml, xml_to_json};
use tempfile::TempDir;

#[test]
fn test_patient_to_json() {
    let fixtures = TestFixtures::new();
    let value = xml_to_json(&fixtures.valid_patient(), &fixtures.patient_schema()).unwrap();

    assert_eq!(
        value,
        json!({
            "@xmlns:sdc4": SDC4_NS,
            "sdc4:label": "Patient Name",
            "sdc4:xdstring-value": "John Doe",
        })
    );
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["@xmlns:sdc4", "sdc4:label", "sdc4:xdstring-value"]);
}

#[test]
fn test_json_to_xml_creates_parent_directories() {
    let fixtures = TestFixtures::new();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("nested").join("deeper").join("patient.xml");

    let data = json!({
        "@xmlns:sdc4": SDC4_NS,
        "sdc4:label": "Patient Name",
        "sdc4:xdstring-value": "Jane Roe",
    });
    json_to_xml(&data, &fixtures.patient_schema(), &output).unwrap();

    let xml = read_to_string(&output);
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<sdc4:Patient"));
    assert!(xml.contains("<sdc4:xdstring-value>Jane Roe</sdc4:xdstring-value>"));

    let validator = Validator::from_path(&fixtures.patient_schema()).unwrap();
    assert!(validator.validate(&output).unwrap().is_valid);
}

#[test]
fn test_invalid_data_is_not_written() {
    let fixtures = TestFixtures::new();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("patient.xml");

    let data = json!({
        "@xmlns:sdc4": SDC4_NS,
        "sdc4:label": "Patient Name",
        "sdc4:xdstring-value": "",
    });
    match json_to_xml(&data, &fixtures.patient_schema(), &output) {
        Err(Error::Conversion { details }) => assert!(details.contains("not valid against")),
        other => panic!("Expected Conversion error, got {:?}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_invalid_instance_is_not_converted() {
    let fixtures = TestFixtures::new();
    let result = xml_to_json(
        &fixtures.invalid("unexpected_element.xml"),
        &fixtures.population_schema(),
    );
    assert!(matches!(result, Err(Error::Conversion { .. })));
}

#[test]
fn test_population_roundtrip() {
    let fixtures = TestFixtures::new();
    let converter = Converter::new(&fixtures.population_schema()).unwrap();
    assert_eq!(converter.root_element(), Some("dm-population"));

    let value = converter.xml_to_json(&fixtures.valid_population()).unwrap();
    assert_eq!(value["dm-label"], "StatePopulation");
    assert_eq!(
        value["sdc4:ms-population-cluster"]["sdc4:ms-adult-count"]["xdcount-value"],
        "30000000"
    );

    let xml = converter.json_to_xml_string(&value).unwrap();
    assert!(xml.contains("<sdc4:dm-population"));
    let again: Value = converter.xml_str_to_json("roundtrip.xml", &xml).unwrap();
    assert_eq!(again, value);
}

#[test]
fn test_non_object_json_is_rejected() {
    let fixtures = TestFixtures::new();
    let converter = Converter::new(&fixtures.patient_schema()).unwrap();
    assert!(matches!(
        converter.json_to_xml_string(&json!(["not", "an", "object"])),
        Err(Error::Conversion { .. })
    ));
}

#[test]
fn test_converter_ignores_compliance() {
    let fixtures = TestFixtures::new();
    assert!(Converter::new(&fixtures.extension_schema()).is_ok());
}

#[test]
fn test_latin1_instance_converts() {
    let fixtures = TestFixtures::new();
    let dir = TempDir::new().unwrap();
    let instance = write_bytes(&dir, "latin1.xml", &latin1_population_with(""));

    let value = xml_to_json(&instance, &fixtures.population_schema()).unwrap();
    assert_eq!(value["@xmlns:sdc4"], SDC4_NS);
    assert_eq!(value["dm-label"], "StatePopulation");
    assert_eq!(value["dm-encoding"], "utf-8");
}
