//! BMEcat XML catalogs
//!
//! Validation runs in two layers. The first checks the document against the
//! XSD of its declared version and namespace through libxml2 and reports every violation with
//! line and node path. Only a schema-clean document reaches the second layer,
//! which deserializes it into [`BmecatDocument`] and applies the business rules
//! the subset schemas leave open (header present, at least one article,
//! identifying fields per article).

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::{
    FormatAdapter, ensure_not_cancelled, has_extension, non_blank, run_blocking, strip_bom,
};
use crate::config::BmecatConfig;
use crate::error::Result;
use crate::formats::bmecat_document::{self, Article, BmecatDocument};
use crate::libxml2::{DocumentCheck, LibXml2Wrapper, XmlIssue};
use crate::model::{
    Attributes, CatalogEntity, ImportMetadata, ParseResult, ParseWarning, ValidationError,
    ValidationResult, ValidationWarning,
};
use crate::schema_loader::{
    BMECAT_2005_NAMESPACE, BmecatVersion, ChainedSchemaSource, SchemaKey, SchemaLoadError,
    SchemaLoader, SchemaSource, declared_namespace, detect_version,
};

pub const FORMAT_ID: &str = "bmecat";
pub const FORMAT_NAME: &str = "BMEcat";
const EXTENSIONS: &[&str] = &[".xml"];

const UNKNOWN_SUPPLIER: &str = "unknown";

/// Validation and parse codes emitted by this adapter
pub mod codes {
    pub const UNSUPPORTED_VERSION: &str = "BMECAT_UNSUPPORTED_VERSION";
    pub const UNSUPPORTED_NAMESPACE: &str = "BMECAT_UNSUPPORTED_NAMESPACE";
    pub const SCHEMA_NOT_AVAILABLE: &str = "SCHEMA_NOT_AVAILABLE";
    pub const SCHEMA_LOAD_FAILED: &str = "BMECAT_SCHEMA_LOAD_FAILED";
    pub const XML_PARSE_ERROR: &str = "BMECAT_XML_PARSE_ERROR";
    pub const SCHEMA_VIOLATION: &str = "BMECAT_SCHEMA_VIOLATION";
    pub const SCHEMA_WARNING: &str = "BMECAT_SCHEMA_WARNING";
    pub const SCHEMA_VALIDATION_ERROR: &str = "BMECAT_SCHEMA_VALIDATION_ERROR";
    pub const DESERIALIZATION_ERROR: &str = "BMECAT_DESERIALIZATION_ERROR";
    pub const MISSING_HEADER: &str = "BMECAT_MISSING_HEADER";
    pub const NO_ARTICLES: &str = "BMECAT_NO_ARTICLES";
    pub const ARTICLE_MISSING_NUMBER: &str = "ARTICLE_MISSING_NUMBER";
    pub const ARTICLE_MISSING_DESCRIPTION: &str = "ARTICLE_MISSING_DESCRIPTION";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const ARTICLE_SKIPPED: &str = "ARTICLE_SKIPPED";
    pub const ARTICLE_INVALID_PRICE: &str = "ARTICLE_INVALID_PRICE";
    pub const ARTICLE_PARSE_ERROR: &str = "ARTICLE_PARSE_ERROR";
}

/// Adapter for BMEcat 1.2 and the 2005 family
pub struct BmecatAdapter {
    schemas: SchemaLoader,
}

impl BmecatAdapter {
    /// Bundled schemas first, then `schema_dir` on disk.
    pub fn new(config: &BmecatConfig) -> Self {
        let source = ChainedSchemaSource::embedded_then_filesystem(config.effective_schema_dir());
        Self::with_schema_source(Arc::new(source), config.schema_cache_capacity)
    }

    pub fn with_schema_source(source: Arc<dyn SchemaSource>, cache_capacity: u64) -> Self {
        Self {
            schemas: SchemaLoader::new(source, cache_capacity),
        }
    }

    pub fn schema_loader(&self) -> &SchemaLoader {
        &self.schemas
    }

    /// Layer one: well-formedness plus XSD validation.
    async fn check_against_schema(
        &self,
        content: &str,
        version: BmecatVersion,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::valid();

        let namespace = declared_namespace(content);
        let Some(key) = SchemaKey::for_namespace(version, namespace.as_deref()) else {
            let namespace = namespace.unwrap_or_default();
            debug!(namespace = %namespace, version = %version, "no schema for BMEcat namespace");
            result.push_error(
                ValidationError::new(
                    codes::UNSUPPORTED_NAMESPACE,
                    format!(
                        "BMEcat {} documents cannot use namespace '{}'",
                        version, namespace
                    ),
                )
                .at_path("/BMECAT/@xmlns")
                .with_suggestion(format!(
                    "Declare no namespace, or {} for BMEcat 2005 and later",
                    BMECAT_2005_NAMESPACE
                )),
            );
            return Ok(result);
        };

        let schema = match self.schemas.load_schema(key).await {
            Ok(schema) => Some(schema),
            Err(SchemaLoadError::Unavailable(_)) => {
                warn!(schema = %key, "no XSD available, skipping schema validation");
                result.push_warning(ValidationWarning::new(
                    codes::SCHEMA_NOT_AVAILABLE,
                    format!(
                        "XSD schema for BMEcat {} not found; schema validation skipped",
                        key
                    ),
                ));
                None
            }
            Err(e) => {
                warn!(schema = %key, error = %e, "XSD could not be loaded");
                result.push_warning(ValidationWarning::new(
                    codes::SCHEMA_LOAD_FAILED,
                    format!("{}; schema validation skipped", e),
                ));
                None
            }
        };

        ensure_not_cancelled(cancel)?;

        let bytes = content.as_bytes().to_vec();
        let outcome = run_blocking(cancel, move || {
            LibXml2Wrapper::new().check_document(schema.as_deref(), &bytes)
        })
        .await?;

        match outcome {
            Ok(Ok(DocumentCheck::Valid { warnings })) => {
                for issue in warnings {
                    result.push_warning(schema_warning(issue));
                }
            }
            Ok(Ok(DocumentCheck::Invalid {
                error_count,
                issues,
            })) => {
                let mut reported = 0;
                for issue in issues {
                    if issue.is_warning() {
                        result.push_warning(schema_warning(issue));
                    } else {
                        reported += 1;
                        result.push_error(schema_violation(issue));
                    }
                }
                if reported == 0 {
                    result.push_error(
                        ValidationError::new(
                            codes::SCHEMA_VIOLATION,
                            format!(
                                "Document failed schema validation with {} error(s)",
                                error_count
                            ),
                        )
                        .at_path("/BMECAT"),
                    );
                }
                debug!(errors = error_count, "BMEcat document violates its schema");
            }
            Ok(Ok(DocumentCheck::Malformed(issue))) => {
                let mut err = ValidationError::new(
                    codes::XML_PARSE_ERROR,
                    format!("XML parsing error: {}", issue.message),
                )
                .with_suggestion("Check XML structure and encoding");
                if let Some(line) = issue.line {
                    err = err.at_line(line);
                }
                result.push_error(err);
            }
            Ok(Ok(DocumentCheck::InternalError { code })) => {
                error!(code, "libxml2 failed while validating BMEcat document");
                result.push_error(ValidationError::new(
                    codes::SCHEMA_VALIDATION_ERROR,
                    format!("Schema validation failed internally (code {})", code),
                ));
            }
            Ok(Err(e)) => {
                error!(error = %e, "libxml2 failed while validating BMEcat document");
                result.push_error(ValidationError::new(
                    codes::SCHEMA_VALIDATION_ERROR,
                    format!("Schema validation failed: {}", e),
                ));
            }
            Err(e) => {
                error!(error = %e, "schema validation task failed");
                result.push_error(ValidationError::new(
                    codes::SCHEMA_VALIDATION_ERROR,
                    format!("Schema validation failed: {}", e),
                ));
            }
        }

        Ok(result)
    }

    /// Layer two: typed deserialization and business rules.
    async fn check_structure(
        &self,
        content: &str,
        version: BmecatVersion,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        let document = match deserialize(content, cancel).await? {
            Ok(document) => document,
            Err(message) => {
                return Ok(ValidationResult::with_errors(vec![
                    ValidationError::new(
                        codes::DESERIALIZATION_ERROR,
                        format!("BMEcat document could not be read: {}", message),
                    )
                    .with_suggestion(
                        "Check that XML element names and nesting match BMEcat schema",
                    ),
                ]));
            }
        };

        Ok(structural_findings(&document, version))
    }
}

#[async_trait]
impl FormatAdapter for BmecatAdapter {
    fn format_id(&self) -> &'static str {
        FORMAT_ID
    }

    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn detect_format(&self, content: &str, file_name: &str) -> f64 {
        let lower = strip_bom(content).to_ascii_lowercase();

        if has_extension(file_name, EXTENSIONS) {
            if lower.contains("bmecat") { 0.95 } else { 0.5 }
        } else if lower.contains("<bmecat") {
            0.9
        } else {
            0.0
        }
    }

    async fn validate(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        ensure_not_cancelled(cancel)?;
        let content = strip_bom(content);

        let declared = detect_version(content);
        let Some(version) = BmecatVersion::parse(&declared.raw) else {
            return Ok(ValidationResult::with_errors(vec![
                ValidationError::new(
                    codes::UNSUPPORTED_VERSION,
                    format!("Unsupported BMEcat version: {}", declared.raw),
                )
                .at_path("/BMECAT/@version")
                .with_suggestion(format!(
                    "Supported versions: {}",
                    BmecatVersion::supported_list()
                )),
            ]));
        };
        debug!(version = %version, source = ?declared.source, "validating BMEcat document");

        let mut result = self.check_against_schema(content, version, cancel).await?;
        if !result.is_valid() {
            return Ok(result);
        }

        ensure_not_cancelled(cancel)?;
        result.merge(self.check_structure(content, version, cancel).await?);

        debug!(
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "BMEcat validation finished"
        );
        Ok(result)
    }

    async fn parse(
        &self,
        content: &str,
        metadata: &ImportMetadata,
        cancel: &CancellationToken,
    ) -> Result<ParseResult> {
        ensure_not_cancelled(cancel)?;

        let document = match deserialize(strip_bom(content), cancel).await? {
            Ok(document) => document,
            Err(message) => {
                warn!(error = %message, "BMEcat document could not be deserialized");
                return Ok(ParseResult::empty(vec![ParseWarning::new(
                    codes::PARSE_ERROR,
                    format!("Failed to parse BMEcat document: {}", message),
                )]));
            }
        };

        if document.header.is_none() {
            return Ok(ParseResult::empty(vec![ParseWarning::new(
                codes::MISSING_HEADER,
                "BMEcat document has no HEADER; nothing imported",
            )]));
        }

        let supplier_id = document
            .supplier_id()
            .or_else(|| non_blank(metadata.supplier_id.as_deref()))
            .or_else(|| non_blank(metadata.source_identifier.as_deref()))
            .unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string());

        let mut entities = Vec::new();
        let mut warnings = Vec::new();
        let mut skipped = 0;

        for article in document.articles() {
            ensure_not_cancelled(cancel)?;

            match map_article(article, &supplier_id, &mut warnings) {
                Ok(Some(entity)) => entities.push(entity),
                Ok(None) => skipped += 1,
                Err(e) => {
                    let identifier = article.identifier();
                    warn!(article = %identifier, error = %e, "failed to map BMEcat article");
                    warnings.push(
                        ParseWarning::new(
                            codes::ARTICLE_PARSE_ERROR,
                            format!("Article could not be mapped: {}", e),
                        )
                        .for_item(identifier),
                    );
                    skipped += 1;
                }
            }
        }

        info!(
            tenant = %metadata.tenant_id,
            supplier = %supplier_id,
            catalog = document.catalog_id().as_deref().unwrap_or("-"),
            parsed = entities.len(),
            skipped,
            "BMEcat import parsed"
        );

        Ok(ParseResult::new(entities, skipped, warnings))
    }
}

/// Outer error is cancellation; inner error is a readable deserializer failure.
async fn deserialize(
    content: &str,
    cancel: &CancellationToken,
) -> Result<std::result::Result<BmecatDocument, String>> {
    let owned = content.to_string();
    let joined = run_blocking(cancel, move || bmecat_document::from_str(&owned)).await?;

    Ok(match joined {
        Ok(Ok(document)) => Ok(document),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => {
            error!(error = %e, "BMEcat deserialization task failed");
            Err(e.to_string())
        }
    })
}

fn item_element(version: BmecatVersion) -> &'static str {
    match version {
        BmecatVersion::V1_2 => "ARTICLE",
        _ => "PRODUCT",
    }
}

fn structural_findings(document: &BmecatDocument, version: BmecatVersion) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if document.header.is_none() {
        result.push_error(
            ValidationError::new(
                codes::MISSING_HEADER,
                "BMEcat document is missing required HEADER element",
            )
            .at_path("/BMECAT/HEADER")
            .with_suggestion("Add a HEADER element with CATALOG and SUPPLIER information"),
        );
    }

    let articles = document.articles();
    if articles.is_empty() {
        result.push_error(
            ValidationError::new(codes::NO_ARTICLES, "BMEcat document contains no articles")
                .at_path("/BMECAT/T_NEW_CATALOG")
                .with_suggestion(format!(
                    "Add at least one {} element to T_NEW_CATALOG",
                    item_element(version)
                )),
        );
    }

    for (index, article) in articles.iter().enumerate() {
        let path = format!(
            "/BMECAT/T_NEW_CATALOG/{}[{}]",
            item_element(version),
            index + 1
        );

        if article.article_number().is_none() && article.supplier_aid().is_none() {
            result.push_warning(
                ValidationWarning::new(
                    codes::ARTICLE_MISSING_NUMBER,
                    format!("Article {} has no article number or supplier id", index + 1),
                )
                .at_path(path.clone())
                .with_suggestion("A generated identifier will be used"),
            );
        }

        if article.short_description().is_none() && article.long_description().is_none() {
            result.push_warning(
                ValidationWarning::new(
                    codes::ARTICLE_MISSING_DESCRIPTION,
                    format!("Article {} has no description", article.identifier()),
                )
                .at_path(path),
            );
        }
    }

    result
}

fn schema_violation(issue: XmlIssue) -> ValidationError {
    let mut err = ValidationError::new(codes::SCHEMA_VIOLATION, issue.message);
    if let Some(line) = issue.line {
        err = err.at_line(line);
    }
    if let Some(path) = issue.path {
        err = err.at_path(path);
    }
    err
}

fn schema_warning(issue: XmlIssue) -> ValidationWarning {
    let mut warning = ValidationWarning::new(codes::SCHEMA_WARNING, issue.message);
    if let Some(line) = issue.line {
        warning = warning.at_line(line);
    }
    if let Some(path) = issue.path {
        warning = warning.at_path(path);
    }
    warning
}

/// `Ok(None)` means the article was skipped and a warning recorded.
fn map_article(
    article: &Article,
    supplier_id: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Result<Option<CatalogEntity>> {
    let identifier = article.identifier();
    let Some(details) = article.details.as_ref() else {
        warnings.push(
            ParseWarning::new(codes::ARTICLE_SKIPPED, "Article has no details and was skipped")
                .for_item(identifier),
        );
        return Ok(None);
    };

    let article_number = article.article_number();
    let supplier_aid = article.supplier_aid();

    let external_id = article_number
        .clone()
        .or_else(|| supplier_aid.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let name = article
        .short_description()
        .or_else(|| article_number.clone())
        .or_else(|| supplier_aid.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let remarks = details.remarks();
    let description = article.long_description().or_else(|| remarks.clone());
    let part_number = details.manufacturer_part_number();

    let (list_price, currency) = match select_price(article, &identifier, warnings) {
        Some((amount, currency)) => (Some(amount), currency),
        None => (None, None),
    };

    let mut attributes = Attributes::new();
    let keywords = details.keywords();
    if !keywords.is_empty() {
        attributes.insert("keywords".to_string(), keywords.join(", "));
    }
    if let Some(manufacturer) = details.manufacturer_name() {
        attributes.insert("manufacturer".to_string(), manufacturer);
    }
    if let Some(part_number) = &part_number {
        attributes.insert("manufacturer_part_number".to_string(), part_number.clone());
    }
    for feature in article.features() {
        let Some(feature_name) = feature.name() else {
            continue;
        };
        let value = feature.value();
        if !value.is_empty() {
            attributes.insert(format!("feature_{}", feature_name), value);
        }
    }
    if let Some(remarks) = remarks {
        attributes.insert("remarks".to_string(), remarks);
    }

    CatalogEntity::builder(external_id, supplier_id, name)
        .description(description)
        .ean(details.ean())
        .manufacturer_part_number(part_number)
        .price(list_price, currency)
        .attributes(attributes)
        .build()
        .map(Some)
}

/// First net price, else the first price. An unreadable amount drops the
/// price and records a warning.
fn select_price(
    article: &Article,
    identifier: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Option<(Decimal, Option<String>)> {
    let price = article
        .prices()
        .find(|price| price.is_net())
        .or_else(|| article.prices().next())?;

    let Some(raw) = non_blank(price.amount.as_deref()) else {
        warnings.push(
            ParseWarning::new(codes::ARTICLE_INVALID_PRICE, "Price has no amount")
                .for_item(identifier),
        );
        return None;
    };

    match Decimal::from_str(&raw) {
        Ok(amount) => Some((amount, non_blank(price.currency.as_deref()))),
        Err(_) => {
            warnings.push(
                ParseWarning::new(
                    codes::ARTICLE_INVALID_PRICE,
                    format!("Invalid price amount '{}'", raw),
                )
                .for_item(identifier),
            );
            None
        }
    }
}
