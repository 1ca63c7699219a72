//! Format registry and import dispatcher
//!
//! The set of formats is closed, so adapters are held as [`CatalogAdapter`]
//! variants rather than trait objects. Detection asks every adapter for a
//! confidence score and the best one above the configured floor wins.

use std::borrow::Cow;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapter::FormatAdapter;
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::formats::{BmecatAdapter, DatanormAdapter};
use crate::model::{ImportMetadata, ParseResult, ValidationResult};

/// Every supported format
pub enum CatalogAdapter {
    Bmecat(BmecatAdapter),
    Datanorm(DatanormAdapter),
}

impl CatalogAdapter {
    fn inner(&self) -> &dyn FormatAdapter {
        match self {
            CatalogAdapter::Bmecat(adapter) => adapter,
            CatalogAdapter::Datanorm(adapter) => adapter,
        }
    }
}

#[async_trait]
impl FormatAdapter for CatalogAdapter {
    fn format_id(&self) -> &'static str {
        self.inner().format_id()
    }

    fn format_name(&self) -> &'static str {
        self.inner().format_name()
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        self.inner().supported_extensions()
    }

    fn detect_format(&self, content: &str, file_name: &str) -> f64 {
        let score = self.inner().detect_format(content, file_name);
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }

    async fn validate(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        self.inner().validate(content, cancel).await
    }

    async fn parse(
        &self,
        content: &str,
        metadata: &ImportMetadata,
        cancel: &CancellationToken,
    ) -> Result<ParseResult> {
        self.inner().parse(content, metadata, cancel).await
    }
}

/// Winning adapter of a detection run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub format_id: &'static str,
    pub confidence: f64,
}

/// Result of validating and, when valid, parsing one file
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub format_id: &'static str,
    /// `None` when the format was chosen explicitly
    pub confidence: Option<f64>,
    pub validation: ValidationResult,
    /// Only present when validation found no errors
    pub parse: Option<ParseResult>,
}

impl ImportOutcome {
    pub fn is_imported(&self) -> bool {
        self.parse.is_some()
    }
}

/// Registered adapters in priority order
pub struct FormatRegistry {
    adapters: Vec<CatalogAdapter>,
    min_confidence: f64,
}

impl FormatRegistry {
    /// BMEcat first, then Datanorm.
    pub fn new(config: &ImportConfig) -> Self {
        Self::from_adapters(
            vec![
                CatalogAdapter::Bmecat(BmecatAdapter::new(&config.bmecat)),
                CatalogAdapter::Datanorm(DatanormAdapter::new(config.datanorm.clone())),
            ],
            config.detection.min_confidence,
        )
    }

    pub fn from_adapters(adapters: Vec<CatalogAdapter>, min_confidence: f64) -> Self {
        Self {
            adapters,
            min_confidence,
        }
    }

    pub fn adapters(&self) -> &[CatalogAdapter] {
        &self.adapters
    }

    pub fn get_by_id(&self, format_id: &str) -> Option<&CatalogAdapter> {
        let wanted = format_id.trim();
        self.adapters
            .iter()
            .find(|adapter| adapter.format_id().eq_ignore_ascii_case(wanted))
    }

    /// Text for detection and parsing; invalid UTF-8 is replaced, never rejected.
    pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
        String::from_utf8_lossy(bytes)
    }

    /// Score of every adapter, in registration order
    pub fn scores(&self, content: &str, file_name: &str) -> Vec<Detection> {
        self.adapters
            .iter()
            .map(|adapter| Detection {
                format_id: adapter.format_id(),
                confidence: adapter.detect_format(content, file_name),
            })
            .collect()
    }

    /// Best adapter strictly above the confidence floor. Ties go to the
    /// adapter registered first.
    pub fn detect(&self, content: &str, file_name: &str) -> Option<Detection> {
        let mut best: Option<Detection> = None;
        for detection in self.scores(content, file_name) {
            debug!(
                format = detection.format_id,
                confidence = detection.confidence,
                file = file_name,
                "format detection score"
            );
            if detection.confidence <= self.min_confidence {
                continue;
            }
            if best.is_none_or(|b| detection.confidence > b.confidence) {
                best = Some(detection);
            }
        }
        best
    }

    /// Adapter for `format_id` if given, otherwise the detected one.
    pub fn resolve(
        &self,
        content: &str,
        file_name: &str,
        format_id: Option<&str>,
    ) -> Result<(&CatalogAdapter, Option<f64>)> {
        if let Some(format_id) = format_id {
            let adapter =
                self.get_by_id(format_id)
                    .ok_or_else(|| ImportError::UnsupportedFormat {
                        format_id: format_id.to_string(),
                    })?;
            return Ok((adapter, None));
        }

        let detection =
            self.detect(content, file_name)
                .ok_or_else(|| ImportError::FormatNotDetected {
                    file_name: file_name.to_string(),
                })?;
        let adapter = self.get_by_id(detection.format_id).ok_or_else(|| {
            ImportError::UnsupportedFormat {
                format_id: detection.format_id.to_string(),
            }
        })?;
        Ok((adapter, Some(detection.confidence)))
    }

    /// Validate, then parse only if validation found no errors.
    pub async fn import(
        &self,
        content: &str,
        file_name: &str,
        format_id: Option<&str>,
        metadata: &ImportMetadata,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome> {
        let (adapter, confidence) = self.resolve(content, file_name, format_id)?;
        info!(
            format = adapter.format_id(),
            confidence = ?confidence,
            file = file_name,
            tenant = %metadata.tenant_id,
            "starting catalog import"
        );

        let validation = adapter.validate(content, cancel).await?;
        let parse = if validation.is_valid() {
            Some(adapter.parse(content, metadata, cancel).await?)
        } else {
            info!(
                errors = validation.errors.len(),
                file = file_name,
                "catalog failed validation, not parsed"
            );
            None
        };

        Ok(ImportOutcome {
            format_id: adapter.format_id(),
            confidence,
            validation,
            parse,
        })
    }
}
