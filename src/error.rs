use thiserror::Error;

/// Main library error type.
///
/// Data problems inside a catalog file never surface here: adapters fold them
/// into [`crate::model::ValidationResult`] errors or [`crate::model::ParseResult`]
/// warnings. What remains are caller-level conditions.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported format: {format_id}")]
    UnsupportedFormat { format_id: String },

    #[error("Unable to detect catalog format for {file_name}")]
    FormatNotDetected { file_name: String },

    #[error("Invalid catalog entity: {reason}")]
    InvalidEntity { reason: String },
}

/// LibXML2-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: null pointer returned")]
    SchemaParseFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Document too large for libxml2: {size} bytes")]
    DocumentTooLarge { size: usize },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ImportError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_display() {
        let unsupported = ImportError::UnsupportedFormat {
            format_id: "edifact".to_string(),
        };
        assert!(unsupported.to_string().contains("Unsupported format"));
        assert!(unsupported.to_string().contains("edifact"));

        let not_detected = ImportError::FormatNotDetected {
            file_name: "upload.bin".to_string(),
        };
        assert!(not_detected.to_string().contains("upload.bin"));

        assert_eq!(ImportError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_libxml2_error_display() {
        let too_large = LibXml2Error::DocumentTooLarge { size: 42 };
        assert_eq!(
            too_large.to_string(),
            "Document too large for libxml2: 42 bytes"
        );
        assert!(
            LibXml2Error::SchemaParseFailed
                .to_string()
                .contains("Schema parsing failed")
        );
    }
}
