use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use catalog_import::adapter::FormatAdapter;
use catalog_import::config::{ConfigManager, ImportConfig};
use catalog_import::error::ImportError;
use catalog_import::registry::FormatRegistry;

mod common;
use common::test_helpers::{TestFixtures, metadata, read_fixture};

fn registry() -> FormatRegistry {
    FormatRegistry::new(&ImportConfig::default())
}

#[tokio::test]
async fn test_fixtures_detect_as_expected_format() {
    let fixtures = TestFixtures::new();
    let registry = registry();

    let cases = [
        (fixtures.bmecat("catalog_2005_2.xml"), "bmecat"),
        (fixtures.bmecat("catalog_1_2.xml"), "bmecat"),
        (fixtures.bmecat("catalog_2005_1_prefixed.xml"), "bmecat"),
        (fixtures.bmecat("malformed.xml"), "bmecat"),
        (fixtures.datanorm("complete.txt"), "datanorm"),
        (fixtures.datanorm("no_header.txt"), "datanorm"),
        (fixtures.datanorm("corrupted.dn"), "datanorm"),
    ];

    for (path, expected) in cases {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let content = read_fixture(path).await;
        let detection = registry.detect(&content, &name).unwrap();
        assert_eq!(detection.format_id, expected, "wrong format for {}", name);
    }
}

#[tokio::test]
async fn test_bmecat_content_detected_without_extension() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.bmecat("catalog_2005_2.xml")).await;

    let detection = registry().detect(&content, "upload").unwrap();
    assert_eq!(detection.format_id, "bmecat");
    assert_eq!(detection.confidence, 0.9);
}

#[tokio::test]
async fn test_import_valid_files() {
    let fixtures = TestFixtures::new();
    let registry = registry();
    let cancel = CancellationToken::new();

    for (path, expected) in [
        (fixtures.bmecat("catalog_2005_2.xml"), 3),
        (fixtures.datanorm("complete.txt"), 2),
    ] {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let content = read_fixture(path).await;

        let outcome = registry
            .import(&content, &name, None, &metadata(), &cancel)
            .await
            .unwrap();

        assert!(outcome.is_imported(), "{} was not imported", name);
        let parse = outcome.parse.unwrap();
        assert_eq!(parse.entities.len(), expected);
        assert_eq!(
            parse.statistics.total_items(),
            parse.statistics.valid_items() + parse.statistics.skipped_items()
        );
    }
}

#[tokio::test]
async fn test_invalid_file_is_not_parsed() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("no_header.txt")).await;

    let outcome = registry()
        .import(
            &content,
            "no_header.txt",
            None,
            &metadata(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.format_id, "datanorm");
    assert_eq!(outcome.confidence, Some(0.7));
    assert!(!outcome.validation.is_valid());
    assert!(!outcome.is_imported());
}

#[tokio::test]
async fn test_explicit_format_skips_detection() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("complete.txt")).await;
    let registry = registry();
    let cancel = CancellationToken::new();

    let outcome = registry
        .import(&content, "feed.bin", Some("DATANORM"), &metadata(), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.confidence, None);
    assert!(outcome.is_imported());

    let unknown = registry
        .import(&content, "feed.bin", Some("edifact"), &metadata(), &cancel)
        .await;
    assert!(matches!(
        unknown,
        Err(ImportError::UnsupportedFormat { ref format_id }) if format_id == "edifact"
    ));
}

#[tokio::test]
async fn test_undetectable_content() {
    let result = registry()
        .import(
            "plain notes, nothing else",
            "notes.md",
            None,
            &metadata(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ImportError::FormatNotDetected { .. })));
}

#[tokio::test]
async fn test_concurrent_imports_share_one_registry() {
    let fixtures = TestFixtures::new();
    let registry = Arc::new(registry());
    let bmecat = Arc::new(read_fixture(fixtures.bmecat("catalog_2005_2.xml")).await);
    let datanorm = Arc::new(read_fixture(fixtures.datanorm("complete.txt")).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        let (content, name) = if i % 2 == 0 {
            (Arc::clone(&bmecat), "catalog.xml")
        } else {
            (Arc::clone(&datanorm), "prices.txt")
        };

        handles.push(tokio::spawn(async move {
            let outcome = registry
                .import(
                    &content,
                    name,
                    None,
                    &metadata(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap();
            (outcome.format_id, outcome.parse.map(|p| p.entities.len()))
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let (format_id, count) = handle.await.unwrap();
        if i % 2 == 0 {
            assert_eq!((format_id, count), ("bmecat", Some(3)));
        } else {
            assert_eq!((format_id, count), ("datanorm", Some(2)));
        }
    }
}

#[tokio::test]
async fn test_registry_from_config_file() {
    let fixtures = TestFixtures::new();
    let config = ConfigManager::load_from_file(&fixtures.strict_config())
        .await
        .unwrap();
    assert_eq!(config.bmecat.schema_cache_capacity, 4);
    assert_eq!(config.detection.min_confidence, 0.6);

    let registry = FormatRegistry::new(&config);
    let content = read_fixture(fixtures.datanorm("complete.txt")).await;

    let detection = registry.detect(&content, "complete.txt").unwrap();
    assert_eq!(detection.format_id, "datanorm");

    // 0.5 for an .xml file that never mentions BMEcat sits below the floor
    assert!(registry.detect("<root/>", "other.xml").is_none());
    assert_eq!(
        registry.get_by_id("bmecat").unwrap().detect_format("<root/>", "other.xml"),
        0.5
    );
}
