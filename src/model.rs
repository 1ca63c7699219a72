//! Canonical catalog model
//!
//! Every adapter converges on these types. They are created fresh per call and
//! carry no state between imports.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// Currency assumed when a price is present but the source names none.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Ordered free-form attributes. Insertion order is preserved.
pub type Attributes = IndexMap<String, String>;

/// Normalized product record produced by every adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntity {
    pub external_id: String,
    pub supplier_id: String,
    pub name: String,
    pub description: Option<String>,
    pub ean: Option<String>,
    pub manufacturer_part_number: Option<String>,
    pub list_price: Option<Decimal>,
    pub currency: String,
    pub attributes: Attributes,
}

impl CatalogEntity {
    pub fn builder(
        external_id: impl Into<String>,
        supplier_id: impl Into<String>,
        name: impl Into<String>,
    ) -> CatalogEntityBuilder {
        CatalogEntityBuilder {
            external_id: external_id.into(),
            supplier_id: supplier_id.into(),
            name: name.into(),
            description: None,
            ean: None,
            manufacturer_part_number: None,
            list_price: None,
            currency: None,
            attributes: Attributes::new(),
        }
    }
}

/// Builder enforcing the entity invariants at construction time
#[derive(Debug, Clone)]
pub struct CatalogEntityBuilder {
    external_id: String,
    supplier_id: String,
    name: String,
    description: Option<String>,
    ean: Option<String>,
    manufacturer_part_number: Option<String>,
    list_price: Option<Decimal>,
    currency: Option<String>,
    attributes: Attributes,
}

impl CatalogEntityBuilder {
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn ean(mut self, ean: Option<String>) -> Self {
        self.ean = ean;
        self
    }

    pub fn manufacturer_part_number(mut self, part_number: Option<String>) -> Self {
        self.manufacturer_part_number = part_number;
        self
    }

    pub fn price(mut self, list_price: Option<Decimal>, currency: Option<String>) -> Self {
        self.list_price = list_price;
        self.currency = currency.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Finish the entity. Fails when the external id is blank; this is the only
    /// place the currency default is applied.
    pub fn build(self) -> Result<CatalogEntity> {
        let external_id = self.external_id.trim().to_string();
        if external_id.is_empty() {
            return Err(ImportError::InvalidEntity {
                reason: "external id must not be empty".to_string(),
            });
        }

        Ok(CatalogEntity {
            external_id,
            supplier_id: self.supplier_id,
            name: self.name,
            description: self.description,
            ean: self.ean,
            manufacturer_part_number: self.manufacturer_part_number,
            list_price: self.list_price,
            currency: self
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            attributes: self.attributes,
        })
    }
}

/// Document-level problem that blocks the import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    pub line_number: Option<usize>,
    pub element_path: Option<String>,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line_number: None,
            element_path: None,
            suggestion: None,
        }
    }

    pub fn at_line(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn at_path(mut self, element_path: impl Into<String>) -> Self {
        self.element_path = Some(element_path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Degraded-but-usable condition found during validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub line_number: Option<usize>,
    pub element_path: Option<String>,
    pub suggestion: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line_number: None,
            element_path: None,
            suggestion: None,
        }
    }

    pub fn at_line(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn at_path(mut self, element_path: impl Into<String>) -> Self {
        self.element_path = Some(element_path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of the validation phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn with_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn with_both(errors: Vec<ValidationError>, warnings: Vec<ValidationWarning>) -> Self {
        Self { errors, warnings }
    }

    /// Warnings never block an import.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Append another stage's findings, keeping order.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// Per-item, non-fatal problem found while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub code: String,
    pub message: String,
    pub item_identifier: Option<String>,
    pub line_number: Option<usize>,
}

impl ParseWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            item_identifier: None,
            line_number: None,
        }
    }

    pub fn for_item(mut self, item_identifier: impl Into<String>) -> Self {
        self.item_identifier = Some(item_identifier.into());
        self
    }

    pub fn at_line(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }
}

/// Counters for one parse run. `total_items` is always `valid_items + skipped_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    total_items: usize,
    valid_items: usize,
    skipped_items: usize,
    imported_at: DateTime<Utc>,
}

impl ImportStatistics {
    pub fn new(valid_items: usize, skipped_items: usize) -> Self {
        Self {
            total_items: valid_items + skipped_items,
            valid_items,
            skipped_items,
            imported_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn valid_items(&self) -> usize {
        self.valid_items
    }

    pub fn skipped_items(&self) -> usize {
        self.skipped_items
    }

    pub fn imported_at(&self) -> DateTime<Utc> {
        self.imported_at
    }
}

/// Outcome of the parse phase
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    pub entities: Vec<CatalogEntity>,
    pub statistics: ImportStatistics,
    pub warnings: Vec<ParseWarning>,
}

impl ParseResult {
    /// Build a result whose statistics are derived from the entity list.
    pub fn new(
        entities: Vec<CatalogEntity>,
        skipped_items: usize,
        warnings: Vec<ParseWarning>,
    ) -> Self {
        let statistics = ImportStatistics::new(entities.len(), skipped_items);
        Self {
            entities,
            statistics,
            warnings,
        }
    }

    /// Nothing parsed; the warnings explain why.
    pub fn empty(warnings: Vec<ParseWarning>) -> Self {
        Self::new(Vec::new(), 0, warnings)
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// Caller-supplied context. Values here are fallbacks only and never override
/// what the file itself states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMetadata {
    pub tenant_id: String,
    pub supplier_id: Option<String>,
    pub source_identifier: Option<String>,
    #[serde(default)]
    pub custom_properties: IndexMap<String, String>,
}

impl ImportMetadata {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }

    pub fn with_supplier_id(mut self, supplier_id: impl Into<String>) -> Self {
        self.supplier_id = Some(supplier_id.into());
        self
    }

    pub fn with_source_identifier(mut self, source_identifier: impl Into<String>) -> Self {
        self.source_identifier = Some(source_identifier.into());
        self
    }
}
