//! Datanorm fixed-width text catalogs
//!
//! Every line is a record whose first character names its layout. Parsing is a
//! small state machine: an article record (`1`) opens an accumulator, pricing
//! (`2`) and text (`4`) records enrich it, and the next article or the footer
//! (`9`) finalizes it into a [`CatalogEntity`].

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{
    FormatAdapter, ensure_not_cancelled, has_extension, snippet, split_lines, strip_bom,
};
use crate::config::DatanormConfig;
use crate::error::Result;
use crate::model::{
    Attributes, CatalogEntity, ImportMetadata, ParseResult, ParseWarning, ValidationError,
    ValidationResult, ValidationWarning,
};

pub const FORMAT_ID: &str = "datanorm";
pub const FORMAT_NAME: &str = "Datanorm";
const EXTENSIONS: &[&str] = &[".txt", ".dn", ".datanorm"];

const EXTENSION_CONFIDENCE: f64 = 0.7;
const CONTENT_CONFIDENCE_SCALE: f64 = 0.9;

/// Validation and parse codes emitted by this adapter
pub mod codes {
    pub const MISSING_HEADER: &str = "DATANORM_MISSING_HEADER";
    pub const MISSING_FOOTER: &str = "DATANORM_MISSING_FOOTER";
    pub const ARTICLE_AFTER_FOOTER: &str = "DATANORM_ARTICLE_AFTER_FOOTER";
    pub const NO_ARTICLES: &str = "DATANORM_NO_ARTICLES";
    pub const INVALID_RECORD: &str = "DATANORM_INVALID_RECORD";
    pub const SHORT_RECORD: &str = "DATANORM_SHORT_RECORD";
    pub const ORPHAN_RECORD: &str = "DATANORM_ORPHAN_RECORD";
    pub const ARTICLE_SKIPPED: &str = "DATANORM_ARTICLE_SKIPPED";
}

/// Character ranges `[start, end)` of the positional fields
mod layout {
    pub const HEADER_SUPPLIER_ID: (usize, usize) = (2, 12);
    pub const ARTICLE_EAN: (usize, usize) = (2, 12);
    pub const ARTICLE_PART_NUMBER: (usize, usize) = (12, 30);
    pub const ARTICLE_NAME: (usize, usize) = (30, 90);
    pub const ARTICLE_SUPPLIER_CODE: (usize, usize) = (90, 98);
    pub const PRICE_AMOUNT: (usize, usize) = (2, 14);
    pub const PRICE_CURRENCY: (usize, usize) = (14, 16);
    pub const TEXT_START: usize = 2;
}

/// A line that cannot be classified as a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record type must be a digit, found '{0}'")]
    InvalidRecordType(char),
}

/// Positional fields of an article record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFields {
    pub ean: Option<String>,
    pub part_number: Option<String>,
    pub name: Option<String>,
    pub supplier_code: Option<String>,
}

/// One classified line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Header { supplier_id: Option<String> },
    Article(ArticleFields),
    /// `price` is `None` when the amount is missing or unreadable
    Pricing {
        price: Option<Decimal>,
        currency: Option<String>,
    },
    Text(Option<String>),
    Footer,
    /// Availability, notes and any other record type not mapped
    Unhandled(char),
}

impl Record {
    /// Classify a non-blank line. Short lines yield empty fields, never an error.
    pub fn parse(line: &str) -> std::result::Result<Self, RecordError> {
        let Some(record_type) = line.chars().next() else {
            return Err(RecordError::InvalidRecordType(' '));
        };

        let record = match record_type {
            '0' => Record::Header {
                supplier_id: field(line, layout::HEADER_SUPPLIER_ID),
            },
            '1' => Record::Article(ArticleFields {
                ean: field(line, layout::ARTICLE_EAN),
                part_number: field(line, layout::ARTICLE_PART_NUMBER),
                name: field(line, layout::ARTICLE_NAME),
                supplier_code: field(line, layout::ARTICLE_SUPPLIER_CODE),
            }),
            '2' => Record::Pricing {
                price: field(line, layout::PRICE_AMOUNT).and_then(|raw| parse_price(&raw)),
                currency: field(line, layout::PRICE_CURRENCY),
            },
            '4' => {
                let text: String = line.chars().skip(layout::TEXT_START).collect();
                let text = text.trim();
                Record::Text((!text.is_empty()).then(|| text.to_string()))
            }
            '9' => Record::Footer,
            other if other.is_ascii_digit() => Record::Unhandled(other),
            other => return Err(RecordError::InvalidRecordType(other)),
        };

        Ok(record)
    }
}

/// Trimmed characters in `[start, end)`, or `None` when the line stops short
/// of the field or the field is blank.
fn field(line: &str, (start, end): (usize, usize)) -> Option<String> {
    let value: String = line.chars().skip(start).take(end - start).collect();
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Invariant-culture decimal: `.` separates decimals, `,` groups thousands.
fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(cleaned.trim()).ok()
}

/// Article being assembled from consecutive records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingArticle {
    pub fields: ArticleFields,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    /// 1-based line of the opening article record
    pub line_number: usize,
}

impl PendingArticle {
    fn open(fields: ArticleFields, line_number: usize) -> Self {
        Self {
            fields,
            line_number,
            ..Self::default()
        }
    }

    fn apply_pricing(&mut self, price: Option<Decimal>, currency: Option<String>) {
        if price.is_some() {
            self.price = price;
        }
        if currency.is_some() {
            self.currency = currency;
        }
    }

    fn append_text(&mut self, text: String) {
        self.description = Some(match self.description.take() {
            Some(existing) => format!("{}\n{}", existing, text),
            None => text,
        });
    }

    /// EAN, else manufacturer part number. Datanorm never synthesizes one.
    pub fn external_id(&self) -> Option<&str> {
        self.fields
            .ean
            .as_deref()
            .or(self.fields.part_number.as_deref())
    }

    /// Build the entity, or `None` when the record has no usable identifier.
    pub fn into_entity(self, supplier_id: &str) -> Option<Result<CatalogEntity>> {
        let external_id = self.external_id()?.to_string();

        let mut attributes = Attributes::new();
        if let Some(code) = self.fields.supplier_code {
            attributes.insert("supplier_code".to_string(), code);
        }

        let name = self.fields.name.unwrap_or_else(|| "Unknown".to_string());
        Some(
            CatalogEntity::builder(external_id, supplier_id, name)
                .description(self.description)
                .ean(self.fields.ean)
                .manufacturer_part_number(self.fields.part_number)
                .price(self.price, self.currency)
                .attributes(attributes)
                .build(),
        )
    }
}

/// What a single transition produced besides the next state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The pending article was closed by this record
    Finished(PendingArticle),
    /// A pricing or text record arrived with no article open
    Orphan,
}

/// Parser state carried from line to line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    pub supplier_id: Option<String>,
    pub current: Option<PendingArticle>,
    pub footer_seen: bool,
}

impl ParserState {
    /// Feed one record read from `line_number`.
    pub fn apply(mut self, record: Record, line_number: usize) -> (Self, Step) {
        match record {
            Record::Header { supplier_id } => {
                if supplier_id.is_some() {
                    self.supplier_id = supplier_id;
                }
                (self, Step::Continue)
            }
            Record::Article(fields) => {
                let finished = self
                    .current
                    .replace(PendingArticle::open(fields, line_number));
                (self, finished.map_or(Step::Continue, Step::Finished))
            }
            Record::Pricing { price, currency } => match self.current.as_mut() {
                Some(article) => {
                    article.apply_pricing(price, currency);
                    (self, Step::Continue)
                }
                None => (self, Step::Orphan),
            },
            Record::Text(text) => match self.current.as_mut() {
                Some(article) => {
                    if let Some(text) = text {
                        article.append_text(text);
                    }
                    (self, Step::Continue)
                }
                None => (self, Step::Orphan),
            },
            Record::Footer => {
                self.footer_seen = true;
                let finished = self.current.take();
                (self, finished.map_or(Step::Continue, Step::Finished))
            }
            Record::Unhandled(_) => (self, Step::Continue),
        }
    }
}

/// Adapter for Datanorm text catalogs
pub struct DatanormAdapter {
    config: DatanormConfig,
}

impl DatanormAdapter {
    pub fn new(config: DatanormConfig) -> Self {
        Self { config }
    }
}

impl Default for DatanormAdapter {
    fn default() -> Self {
        Self::new(DatanormConfig::default())
    }
}

/// Collects finished articles into entities and skip counts
struct Collector<'a> {
    fallback_supplier: &'a str,
    entities: Vec<CatalogEntity>,
    warnings: Vec<ParseWarning>,
    skipped: usize,
}

impl Collector<'_> {
    fn finish(&mut self, article: PendingArticle, supplier_id: Option<&str>) {
        let supplier_id = supplier_id.unwrap_or(self.fallback_supplier);
        let line_number = article.line_number;
        let label = article
            .fields
            .name
            .clone()
            .unwrap_or_else(|| format!("line {}", line_number));

        match article.into_entity(supplier_id) {
            Some(Ok(entity)) => self.entities.push(entity),
            Some(Err(e)) => {
                warn!(line = line_number, error = %e, "Datanorm article could not be built");
                self.skip(label, line_number, e.to_string());
            }
            None => {
                debug!(line = line_number, "Datanorm article without EAN or part number");
                self.skip(
                    label,
                    line_number,
                    "Article has neither EAN nor manufacturer part number".to_string(),
                );
            }
        }
    }

    fn skip(&mut self, item: String, line_number: usize, message: String) {
        self.warnings.push(
            ParseWarning::new(codes::ARTICLE_SKIPPED, message)
                .for_item(item)
                .at_line(line_number),
        );
        self.skipped += 1;
    }
}

#[async_trait]
impl FormatAdapter for DatanormAdapter {
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
        if has_extension(file_name, EXTENSIONS) {
            return EXTENSION_CONFIDENCE;
        }

        let lines = split_lines(strip_bom(content));
        let sample = self.config.detection_sample_lines.min(lines.len());
        if lines.len() < 2 || sample == 0 {
            return 0.0;
        }

        let matching = lines
            .iter()
            .take(sample)
            .filter(|line| {
                line.chars().next().is_some_and(|c| c.is_ascii_digit())
                    && line.chars().count() > self.config.detection_min_line_length
            })
            .count();

        let ratio = matching as f64 / sample as f64;
        if ratio > 0.5 {
            ratio * CONTENT_CONFIDENCE_SCALE
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
        let lines = split_lines(strip_bom(content));
        let mut result = ValidationResult::valid();

        let starts_with = |c: char| lines.iter().any(|line| line.starts_with(c));

        if !starts_with('0') {
            result.push_error(
                ValidationError::new(
                    codes::MISSING_HEADER,
                    "Datanorm file must start with record type 0 (header)",
                )
                .at_line(1)
                .with_suggestion("Add a header record starting with '0'"),
            );
        }
        if !starts_with('9') {
            result.push_warning(ValidationWarning::new(
                codes::MISSING_FOOTER,
                "Datanorm file should end with record type 9 (footer)",
            ));
        }
        if !starts_with('1') {
            result.push_error(ValidationError::new(
                codes::NO_ARTICLES,
                "Datanorm file must contain at least one article record (type 1)",
            ));
        }

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;

            if !line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                result.push_error(
                    ValidationError::new(
                        codes::INVALID_RECORD,
                        format!(
                            "Record must start with digit (record type 0-9): '{}'",
                            snippet(line, self.config.snippet_length)
                        ),
                    )
                    .at_line(line_number),
                );
            }

            if line.chars().count() < self.config.min_record_length {
                result.push_warning(
                    ValidationWarning::new(
                        codes::SHORT_RECORD,
                        "Record appears truncated (very short line)",
                    )
                    .at_line(line_number),
                );
            }
        }

        debug!(
            lines = lines.len(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Datanorm validation finished"
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

        let fallback_supplier = metadata
            .supplier_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&metadata.tenant_id);
        let mut collector = Collector {
            fallback_supplier,
            entities: Vec::new(),
            warnings: Vec::new(),
            skipped: 0,
        };
        let mut state = ParserState::default();

        for (index, line) in split_lines(strip_bom(content)).into_iter().enumerate() {
            ensure_not_cancelled(cancel)?;
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;

            let record = match Record::parse(line) {
                Ok(record) => record,
                Err(e) => {
                    let shown = snippet(line, self.config.snippet_length);
                    warn!(line = line_number, record = %shown, error = %e, "skipping Datanorm line");
                    collector.warnings.push(
                        ParseWarning::new(codes::INVALID_RECORD, format!("{}: '{}'", e, shown))
                            .at_line(line_number),
                    );
                    collector.skipped += 1;
                    continue;
                }
            };

            let (next, step) = state.apply(record, line_number);
            state = next;

            match step {
                Step::Continue => {}
                Step::Finished(article) => {
                    collector.finish(article, state.supplier_id.as_deref());
                }
                Step::Orphan => {
                    collector.warnings.push(
                        ParseWarning::new(
                            codes::ORPHAN_RECORD,
                            format!(
                                "Record '{}' does not belong to any article",
                                snippet(line, self.config.snippet_length)
                            ),
                        )
                        .at_line(line_number),
                    );
                }
            }
        }

        if let Some(article) = state.current.take() {
            let warning = if state.footer_seen {
                ParseWarning::new(
                    codes::ARTICLE_AFTER_FOOTER,
                    "Article record after footer; article finalized at end of input",
                )
                .at_line(article.line_number)
            } else {
                ParseWarning::new(
                    codes::MISSING_FOOTER,
                    "Input ended without footer record; last article finalized",
                )
            };
            collector.warnings.push(warning);
            collector.finish(article, state.supplier_id.as_deref());
        }

        info!(
            tenant = %metadata.tenant_id,
            parsed = collector.entities.len(),
            skipped = collector.skipped,
            "Datanorm import parsed"
        );

        Ok(ParseResult::new(
            collector.entities,
            collector.skipped,
            collector.warnings,
        ))
    }
}
