use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("unexpected table layout: {0}")]
    Schema(String),

    #[error("submit date '{value}' does not match month/day/year: {message}")]
    DateParse { value: String, message: String },

    #[error("no rows survived cleaning: {0}")]
    EmptyDataset(String),

    #[error("write to {path} failed: {message}")]
    Write { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error category reported per page in a run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Schema,
    DateParse,
    EmptyDataset,
    Write,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::Schema => "schema",
            ErrorKind::DateParse => "date_parse",
            ErrorKind::EmptyDataset => "empty_dataset",
            ErrorKind::Write => "write",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EtlError {
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        EtlError::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn write(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        EtlError::Write {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Fetch { .. } => ErrorKind::Fetch,
            EtlError::Schema(_) => ErrorKind::Schema,
            EtlError::DateParse { .. } => ErrorKind::DateParse,
            EtlError::EmptyDataset(_) => ErrorKind::EmptyDataset,
            // io and csv errors only surface while encoding or persisting an artifact
            EtlError::Write { .. } | EtlError::Io(_) | EtlError::Csv(_) => ErrorKind::Write,
            EtlError::Config(_) | EtlError::Toml(_) | EtlError::Json(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
