use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use catalog_import::adapter::FormatAdapter;
use catalog_import::config::DatanormConfig;
use catalog_import::formats::DatanormAdapter;
use catalog_import::formats::datanorm::codes;

mod common;
use common::test_helpers::{TestFixtures, metadata, read_fixture};

#[tokio::test]
async fn test_complete_file_validates_cleanly() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("complete.txt")).await;

    let result = DatanormAdapter::default()
        .validate(&content, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn test_parse_complete_file() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("complete.txt")).await;

    let result = DatanormAdapter::default()
        .parse(
            &content,
            &metadata().with_supplier_id("IGNORED"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.entities.len(), 2);
    assert_eq!(result.statistics.valid_items(), 2);
    assert_eq!(result.statistics.skipped_items(), 1);
    assert_eq!(result.statistics.total_items(), 3);

    let cable = &result.entities[0];
    assert_eq!(cable.external_id, "4011111111");
    assert_eq!(cable.supplier_id, "ELEK-01");
    assert_eq!(cable.name, "Mantelleitung NYM-J 3x1,5 100m");
    assert_eq!(cable.ean.as_deref(), Some("4011111111"));
    assert_eq!(cable.manufacturer_part_number.as_deref(), Some("NYM-3X1.5"));
    assert_eq!(cable.list_price, Some(Decimal::new(8990, 2)));
    assert_eq!(cable.currency, "EU");
    assert_eq!(
        cable.description.as_deref(),
        Some("Installationsleitung fuer feste Verlegung\nRing 100 m")
    );
    assert_eq!(cable.attributes["supplier_code"], "EL100");

    let breaker = &result.entities[1];
    assert_eq!(breaker.external_id, "SCH-16A");
    assert_eq!(breaker.ean, None);
    assert_eq!(breaker.list_price, Some(Decimal::new(435, 2)));
    assert_eq!(breaker.currency, "EUR");
    assert!(breaker.description.is_none());

    let skipped = result
        .warnings
        .iter()
        .find(|w| w.code == codes::ARTICLE_SKIPPED)
        .unwrap();
    assert_eq!(skipped.item_identifier.as_deref(), Some("Artikel ohne Nummer"));
    assert_eq!(skipped.line_number, Some(9));
}

#[tokio::test]
async fn test_file_without_header() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("no_header.txt")).await;
    let adapter = DatanormAdapter::default();
    let cancel = CancellationToken::new();

    let validation = adapter.validate(&content, &cancel).await.unwrap();
    assert!(!validation.is_valid());
    assert!(validation.has_error(codes::MISSING_HEADER));
    assert!(validation.has_warning(codes::MISSING_FOOTER));
    assert!(!validation.has_error(codes::NO_ARTICLES));

    let parsed = adapter
        .parse(&content, &metadata().with_supplier_id("SUP-META"), &cancel)
        .await
        .unwrap();
    assert_eq!(parsed.entities.len(), 2);
    assert!(parsed.entities.iter().all(|e| e.supplier_id == "SUP-META"));
    assert_eq!(parsed.entities[1].external_id, "4022222222");
    assert!(parsed.has_warning(codes::MISSING_FOOTER));
}

#[tokio::test]
async fn test_corrupted_file() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("corrupted.dn")).await;
    let adapter = DatanormAdapter::default();
    let cancel = CancellationToken::new();

    let validation = adapter.validate(&content, &cancel).await.unwrap();
    assert!(!validation.is_valid());
    let invalid = validation
        .errors
        .iter()
        .find(|e| e.code == codes::INVALID_RECORD)
        .unwrap();
    assert_eq!(invalid.line_number, Some(3));
    let short = validation
        .warnings
        .iter()
        .find(|w| w.code == codes::SHORT_RECORD)
        .unwrap();
    assert_eq!(short.line_number, Some(5));

    let parsed = adapter.parse(&content, &metadata(), &cancel).await.unwrap();
    assert_eq!(parsed.entities.len(), 2);
    assert_eq!(parsed.statistics.skipped_items(), 1);
    assert!(parsed.has_warning(codes::INVALID_RECORD));
    assert_eq!(parsed.entities[0].list_price, Some(Decimal::ONE));
}

#[tokio::test]
async fn test_snippet_length_limits_reported_line() {
    let fixtures = TestFixtures::new();
    let content = read_fixture(fixtures.datanorm("corrupted.dn")).await;
    let adapter = DatanormAdapter::new(DatanormConfig {
        snippet_length: 5,
        ..DatanormConfig::default()
    });

    let validation = adapter
        .validate(&content, &CancellationToken::new())
        .await
        .unwrap();
    let invalid = validation
        .errors
        .iter()
        .find(|e| e.code == codes::INVALID_RECORD)
        .unwrap();
    assert!(!invalid.message.contains("defekte"));
}

#[test]
fn test_detection_by_content_and_extension() {
    let fixtures = TestFixtures::new();
    let content = std::fs::read_to_string(fixtures.datanorm("complete.txt")).unwrap();
    let adapter = DatanormAdapter::default();

    assert_eq!(adapter.detect_format(&content, "complete.txt"), 0.7);

    let by_content = adapter.detect_format(&content, "upload.bin");
    assert!(by_content > 0.5, "content score was {}", by_content);
    assert!(by_content <= 0.9);

    assert_eq!(adapter.detect_format("just one line", "upload.bin"), 0.0);
}
