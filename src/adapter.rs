//! The contract every catalog format implements, plus small text helpers the
//! adapters share.

use async_trait::async_trait;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::error::{ImportError, Result};
use crate::model::{ImportMetadata, ParseResult, ValidationResult};

/// One catalog file format.
///
/// Implementations are long-lived and shared between concurrent imports, so no
/// method mutates adapter state beyond internal caches.
#[async_trait]
pub trait FormatAdapter: Send + Sync {
    /// Stable machine identifier, e.g. `"bmecat"`
    fn format_id(&self) -> &'static str;

    /// Human readable name
    fn format_name(&self) -> &'static str;

    /// Lower-case extensions including the dot
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Confidence in `[0.0, 1.0]` that `content` is this format. Never fails;
    /// unrelated or garbage input scores `0.0`.
    fn detect_format(&self, content: &str, file_name: &str) -> f64;

    /// Check `content` without producing entities.
    ///
    /// Data problems are reported inside the returned [`ValidationResult`]. The
    /// only error is [`ImportError::Cancelled`].
    async fn validate(&self, content: &str, cancel: &CancellationToken)
    -> Result<ValidationResult>;

    /// Map `content` to canonical entities. Bad records become warnings; the
    /// only error is [`ImportError::Cancelled`].
    async fn parse(
        &self,
        content: &str,
        metadata: &ImportMetadata,
        cancel: &CancellationToken,
    ) -> Result<ParseResult>;
}

/// Bail out with [`ImportError::Cancelled`] once the caller gave up.
pub fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ImportError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run blocking work off the async threads, giving up early on cancellation.
///
/// The inner `Err` is a panicked task; callers report it as a document-level
/// problem instead of propagating it.
pub async fn run_blocking<T, F>(
    cancel: &CancellationToken,
    work: F,
) -> Result<std::result::Result<T, JoinError>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    tokio::select! {
        _ = cancel.cancelled() => Err(ImportError::Cancelled),
        joined = task => Ok(joined),
    }
}

/// Case-insensitive extension check against `extensions` (with leading dot).
pub fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    let lower = file_name.trim().to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// Drop a leading UTF-8 byte order mark.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Split on `\r\n`, `\r` or `\n`. A trailing terminator does not produce an
/// empty last line.
pub fn split_lines(content: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = content.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&content[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&content[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        lines.push(&content[start..]);
    }
    lines
}

/// First `max_chars` characters of `line`, with an ellipsis when cut.
pub fn snippet(line: &str, max_chars: usize) -> String {
    let mut chars = line.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Trimmed, non-empty text or `None`
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
