use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("invalid metadata record: {0}")]
    Validation(String),

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("field {0} is fixed when the record is created")]
    ImmutableField(&'static str),

    #[error("no stored entry for ontology {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("failed to parse RDF: {0}")]
    Parse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{source_title}: {message}")]
    Extraction {
        source_title: &'static str,
        message: String,
    },
}

/// Whether an error only costs the current ontology or the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Transient,
    Fatal,
}

impl IndexError {
    pub fn severity(&self) -> Severity {
        match self {
            IndexError::HttpStatus { status, .. } if is_transient_status(*status) => {
                Severity::Transient
            }
            IndexError::Timeout(_) | IndexError::Http(_) => Severity::Transient,
            _ => Severity::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.severity() == Severity::Transient
    }

    pub(crate) fn extraction(source_title: &'static str, message: impl Into<String>) -> Self {
        IndexError::Extraction {
            source_title,
            message: message.into(),
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 403 | 404 | 500 | 502 | 503 | 504)
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::Storage(err.to_string())
    }
}

impl From<csv::Error> for IndexError {
    fn from(err: csv::Error) -> Self {
        IndexError::Csv(err.to_string())
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return IndexError::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return IndexError::HttpStatus {
                status: status.as_u16(),
                url: err
                    .url()
                    .map(|url| url.to_string())
                    .unwrap_or_default(),
            };
        }
        IndexError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses() {
        for status in [403, 404, 500, 504] {
            let err = IndexError::HttpStatus {
                status,
                url: "http://example.org".to_string(),
            };
            assert_eq!(err.severity(), Severity::Transient);
        }
        let err = IndexError::HttpStatus {
            status: 401,
            url: "http://example.org".to_string(),
        };
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn storage_and_validation_are_fatal() {
        assert!(!IndexError::Storage("disk full".to_string()).is_transient());
        assert!(!IndexError::Validation("no title".to_string()).is_transient());
        assert!(IndexError::Timeout("slow".to_string()).is_transient());
    }
}
