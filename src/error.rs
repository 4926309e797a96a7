//! Error taxonomy for the sync pipeline.
//!
//! Every fatal failure ends up as one of these variants; the binary maps the
//! variant to its exit code. A product code that resolves to no catalog
//! product is deliberately NOT an error (warned and skipped upstream).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or unusable configuration, detected before any network call.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The asset feed answered with a payload shape we do not recognize.
    #[error("asset feed format error: {message}")]
    SourceFormat { message: String },

    /// A remote call kept failing after the retry budget was spent, or failed
    /// with a status that is not worth retrying.
    #[error("remote call '{operation}' failed: {message}")]
    RemoteCall {
        operation: String,
        /// Last HTTP status seen, when the failure got that far.
        status: Option<u16>,
        message: String,
    },

    /// The catalog accepted the request transport-wise but rejected the media
    /// payload itself. User errors are never retried.
    #[error("catalog rejected '{operation}': {}", errors.join("; "))]
    CatalogValidation {
        operation: String,
        errors: Vec<String>,
    },
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Configuration {
            message: message.into(),
        }
    }

    pub fn source_format(message: impl Into<String>) -> Self {
        SyncError::SourceFormat {
            message: message.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::RemoteCall {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_operation_and_status_message() {
        let e = SyncError::remote("asset_feed", Some(503), "gave up after 3 attempts");
        assert_eq!(
            e.to_string(),
            "remote call 'asset_feed' failed: gave up after 3 attempts"
        );
    }

    #[test]
    fn test_validation_display_joins_messages() {
        let e = SyncError::CatalogValidation {
            operation: "productCreateMedia".into(),
            errors: vec!["bad media type".into(), "unreachable url".into()],
        };
        assert_eq!(
            e.to_string(),
            "catalog rejected 'productCreateMedia': bad media type; unreachable url"
        );
    }
}
