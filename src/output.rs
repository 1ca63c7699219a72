//! Human and JSON rendering of command results

use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::adapter::FormatAdapter;
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::model::{ParseResult, ParseWarning, ValidationError, ValidationResult, ValidationWarning};
use crate::registry::{Detection, FormatRegistry, ImportOutcome};

/// Formatter for command results
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

#[derive(Serialize)]
struct FormatInfo {
    id: &'static str,
    name: &'static str,
    extensions: &'static [&'static str],
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: format == OutputFormat::Human && atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn formats(&self, registry: &FormatRegistry) -> serde_json::Result<String> {
        let infos: Vec<FormatInfo> = registry
            .adapters()
            .iter()
            .map(|adapter| FormatInfo {
                id: adapter.format_id(),
                name: adapter.format_name(),
                extensions: adapter.supported_extensions(),
            })
            .collect();

        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(&infos);
        }

        let mut output = String::from("Supported formats:\n");
        for info in infos {
            output.push_str(&format!(
                "  {:<10} {:<10} {}\n",
                info.id,
                info.name,
                info.extensions.join(", ")
            ));
        }
        Ok(output)
    }

    pub fn detection(
        &self,
        file: &Path,
        scores: &[Detection],
        detected: Option<Detection>,
    ) -> serde_json::Result<String> {
        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(&json!({
                "file": file.display().to_string(),
                "scores": scores,
                "detected": detected,
            }));
        }

        let mut output = match detected {
            Some(detection) => format!(
                "{}  {} is {} (confidence {:.2})\n",
                self.colorize("✓ DETECTED", "32"),
                file.display(),
                detection.format_id,
                detection.confidence
            ),
            None => format!(
                "{}  {} matches no known format\n",
                self.colorize("✗ UNKNOWN", "31"),
                file.display()
            ),
        };

        if self.verbosity >= VerbosityLevel::Verbose {
            for score in scores {
                output.push_str(&format!(
                    "    {:<10} {:.2}\n",
                    score.format_id, score.confidence
                ));
            }
        }
        Ok(output)
    }

    pub fn validation(
        &self,
        file: &Path,
        format_id: &str,
        result: &ValidationResult,
    ) -> serde_json::Result<String> {
        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(&json!({
                "file": file.display().to_string(),
                "format": format_id,
                "valid": result.is_valid(),
                "errors": result.errors,
                "warnings": result.warnings,
            }));
        }

        Ok(self.validation_text(file, format_id, result))
    }

    pub fn import(&self, file: &Path, outcome: &ImportOutcome) -> serde_json::Result<String> {
        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(&json!({
                "file": file.display().to_string(),
                "outcome": outcome,
            }));
        }

        let mut output = self.validation_text(file, outcome.format_id, &outcome.validation);
        if let Some(parse) = &outcome.parse {
            output.push_str(&self.parse_text(parse));
        }
        Ok(output)
    }

    fn validation_text(&self, file: &Path, format_id: &str, result: &ValidationResult) -> String {
        let mut output = if result.is_valid() {
            format!(
                "{}  {} ({})",
                self.colorize("✓ VALID", "32"),
                file.display(),
                format_id
            )
        } else {
            let count = result.errors.len();
            format!(
                "{}  {} ({}) - {} error{}",
                self.colorize("✗ INVALID", "31"),
                file.display(),
                format_id,
                count,
                if count == 1 { "" } else { "s" }
            )
        };
        if !result.warnings.is_empty() {
            output.push_str(&format!(", {} warning(s)", result.warnings.len()));
        }
        output.push('\n');

        for error in &result.errors {
            output.push_str(&format!("    {}\n", describe_error(error)));
        }
        if self.verbosity >= VerbosityLevel::Verbose {
            for warning in &result.warnings {
                output.push_str(&format!(
                    "    {} {}\n",
                    self.colorize("warning:", "33"),
                    describe_warning(warning)
                ));
            }
        }
        output
    }

    fn parse_text(&self, parse: &ParseResult) -> String {
        let stats = parse.statistics;
        let mut output = String::from("Import Summary:\n");
        output.push_str(&format!("  Total items: {}\n", stats.total_items()));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Imported:", "32"),
            stats.valid_items()
        ));
        if stats.skipped_items() > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                stats.skipped_items()
            ));
        }
        if !parse.warnings.is_empty() {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Warnings:", "33"),
                parse.warnings.len()
            ));
        }

        if self.verbosity >= VerbosityLevel::Verbose {
            for warning in &parse.warnings {
                output.push_str(&format!("    {}\n", describe_parse_warning(warning)));
            }
        }

        if self.verbosity == VerbosityLevel::Debug {
            output.push_str("\nEntities:\n");
            for entity in &parse.entities {
                let price = entity
                    .list_price
                    .map(|p| format!("{} {}", p, entity.currency))
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!(
                    "  {}  {}  [{}]\n",
                    entity.external_id, entity.name, price
                ));
            }
        }
        output
    }
}

fn location(line: Option<usize>, path: Option<&str>) -> String {
    match (line, path) {
        (Some(line), Some(path)) => format!(" (line {}, {})", line, path),
        (Some(line), None) => format!(" (line {})", line),
        (None, Some(path)) => format!(" ({})", path),
        (None, None) => String::new(),
    }
}

fn describe_error(error: &ValidationError) -> String {
    let mut text = format!(
        "[{}] {}{}",
        error.code,
        error.message,
        location(error.line_number, error.element_path.as_deref())
    );
    if let Some(suggestion) = &error.suggestion {
        text.push_str(&format!("\n      hint: {}", suggestion));
    }
    text
}

fn describe_warning(warning: &ValidationWarning) -> String {
    format!(
        "[{}] {}{}",
        warning.code,
        warning.message,
        location(warning.line_number, warning.element_path.as_deref())
    )
}

fn describe_parse_warning(warning: &ParseWarning) -> String {
    let item = warning
        .item_identifier
        .as_deref()
        .map(|id| format!(" <{}>", id))
        .unwrap_or_default();
    format!(
        "[{}]{} {}{}",
        warning.code,
        item,
        warning.message,
        location(warning.line_number, None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use std::path::PathBuf;

    fn invalid_result() -> ValidationResult {
        ValidationResult::with_both(
            vec![
                ValidationError::new("DATANORM_MISSING_HEADER", "no header")
                    .at_line(1)
                    .with_suggestion("Add a header record"),
            ],
            vec![ValidationWarning::new("DATANORM_MISSING_FOOTER", "no footer")],
        )
    }

    #[test]
    fn test_human_validation_lists_errors() {
        let output = Output::new(VerbosityLevel::Normal, OutputFormat::Human).with_colors(false);
        let text = output
            .validation(&PathBuf::from("prices.txt"), "datanorm", &invalid_result())
            .unwrap();

        assert!(text.starts_with("✗ INVALID  prices.txt (datanorm) - 1 error, 1 warning(s)"));
        assert!(text.contains("[DATANORM_MISSING_HEADER] no header (line 1)"));
        assert!(text.contains("hint: Add a header record"));
        assert!(!text.contains("no footer"));
    }

    #[test]
    fn test_verbose_validation_lists_warnings() {
        let output = Output::new(VerbosityLevel::Verbose, OutputFormat::Human).with_colors(false);
        let text = output
            .validation(&PathBuf::from("prices.txt"), "datanorm", &invalid_result())
            .unwrap();
        assert!(text.contains("warning: [DATANORM_MISSING_FOOTER] no footer"));
    }

    #[test]
    fn test_json_validation() {
        let output = Output::new(VerbosityLevel::Normal, OutputFormat::Json);
        let text = output
            .validation(&PathBuf::from("prices.txt"), "datanorm", &invalid_result())
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["valid"], false);
        assert_eq!(value["errors"][0]["code"], "DATANORM_MISSING_HEADER");
        assert_eq!(value["errors"][0]["line_number"], 1);
    }

    #[test]
    fn test_formats_listing() {
        let registry = FormatRegistry::new(&ImportConfig::default());
        let output = Output::new(VerbosityLevel::Normal, OutputFormat::Human);
        let text = output.formats(&registry).unwrap();
        assert!(text.contains("bmecat"));
        assert!(text.contains(".txt, .dn, .datanorm"));

        let json = Output::new(VerbosityLevel::Normal, OutputFormat::Json)
            .formats(&registry)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[1]["id"], "datanorm");
    }
}
