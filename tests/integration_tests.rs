use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

mod common;

use common::test_helpers::{TestFixtures, population_with, write_file};
use sdc4_validator::batch::{EXIT_SEMANTIC, EXIT_STRUCTURAL, EXIT_VALID};
use sdc4_validator::{
    BatchConfig, BatchSummary, BatchValidator, InstanceDiscovery, InstanceStatus, Validator,
};

fn batch(max_concurrent: usize) -> BatchValidator {
    let validator = Validator::from_path(&TestFixtures::new().population_schema()).unwrap();
    BatchValidator::new(
        Arc::new(validator),
        BatchConfig {
            max_concurrent,
            timeout: Duration::from_secs(30),
        },
    )
}

#[tokio::test]
async fn test_discover_and_validate_fixture_tree() {
    let fixtures = TestFixtures::new();
    let discovered = InstanceDiscovery::new()
        .discover_all(&[fixtures.xml_invalid_dir(), fixtures.valid_population()])
        .await
        .unwrap();

    assert_eq!(discovered.len(), 6);

    let outcomes = batch(2).validate_all(discovered.clone()).await.unwrap();
    let paths: Vec<_> = outcomes.iter().map(|o| o.path.clone()).collect();
    assert_eq!(paths, discovered);

    let summary = BatchSummary::aggregate(&outcomes);
    assert_eq!(summary.total, 6);
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.semantic_only, 2);
    assert_eq!(summary.structural, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.exit_code(), EXIT_STRUCTURAL);
}

#[tokio::test]
async fn test_per_instance_exit_codes() {
    let fixtures = TestFixtures::new();
    let paths = vec![
        fixtures.valid_population(),
        fixtures.invalid("bad_count.xml"),
        fixtures.invalid("unexpected_element.xml"),
        fixtures.malformed_xml(),
    ];

    let outcomes = batch(4).validate_all(paths).await.unwrap();
    let codes: Vec<u8> = outcomes.iter().map(|o| o.exit_code()).collect();
    assert_eq!(codes, vec![EXIT_VALID, EXIT_SEMANTIC, EXIT_STRUCTURAL, EXIT_STRUCTURAL]);

    match &outcomes[3].status {
        InstanceStatus::Failed { message } => assert!(message.contains("not_well_formed.xml")),
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert!(outcomes[3].report().is_none());
}

#[tokio::test]
async fn test_semantic_only_batch_exits_one() {
    let fixtures = TestFixtures::new();
    let outcomes = batch(1)
        .validate_all(vec![
            fixtures.invalid("bad_count.xml"),
            fixtures.invalid("unknown_state.xml"),
            fixtures.valid_population(),
        ])
        .await
        .unwrap();

    let summary = BatchSummary::aggregate(&outcomes);
    assert!(!summary.all_valid());
    assert_eq!(summary.exit_code(), EXIT_SEMANTIC);
}

#[tokio::test]
async fn test_generated_directory_tree() {
    let dir = TempDir::new().unwrap();
    for i in 0..20 {
        let extra = if i % 5 == 0 { "<Stray/>" } else { "" };
        write_file(
            &dir,
            &format!("batch{:02}/doc{:02}.xml", i % 3, i),
            &population_with(extra),
        );
    }
    write_file(&dir, "notes.txt", "not an instance");
    write_file(&dir, "batch00/data.json", "{}");

    let discovered = InstanceDiscovery::new()
        .discover(dir.path())
        .await
        .unwrap();
    assert_eq!(discovered.len(), 20);
    assert!(discovered.windows(2).all(|w| w[0] <= w[1]));

    let outcomes = batch(8).validate_all(discovered).await.unwrap();
    let summary = BatchSummary::aggregate(&outcomes);
    assert_eq!(summary.valid, 16);
    assert_eq!(summary.structural, 4);
    assert_eq!(summary.exit_code(), EXIT_STRUCTURAL);
}

#[tokio::test]
async fn test_all_valid_batch() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<_> = (0..5)
        .map(|i| write_file(&dir, &format!("ok{}.xml", i), &population_with("")))
        .collect();

    let outcomes = batch(2).validate_all(paths).await.unwrap();
    let summary = BatchSummary::aggregate(&outcomes);
    assert!(summary.all_valid());
    assert_eq!(summary.exit_code(), EXIT_VALID);
}
