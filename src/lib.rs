//! # catalog-import
//!
//! Format detection, validation and parsing of supplier product catalogs into
//! one canonical entity model.
//!
//! Two formats are supported: BMEcat XML (1.2 and 2005 family, validated
//! against bundled XSDs through libxml2) and Datanorm fixed-width text. Callers
//! usually go through [`FormatRegistry`], which picks the adapter with the
//! highest detection confidence, validates, and parses only valid files.

pub mod adapter;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod formats;
pub mod libxml2;
pub mod logging;
pub mod model;
pub mod output;
pub mod registry;
pub mod schema_loader;

pub use adapter::FormatAdapter;
pub use cache::ParsedSchemaCache;
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{ConfigManager, ImportConfig};
pub use error::{ImportError, LibXml2Error};
pub use formats::{BmecatAdapter, DatanormAdapter};
pub use libxml2::{DocumentCheck, LibXml2Wrapper, XmlSchemaPtr};
pub use model::{
    CatalogEntity, ImportMetadata, ImportStatistics, ParseResult, ParseWarning, ValidationError,
    ValidationResult, ValidationWarning,
};
pub use output::Output;
pub use registry::{CatalogAdapter, Detection, FormatRegistry, ImportOutcome};
pub use schema_loader::{BmecatVersion, SchemaLoader, SchemaSource};
