//! Error taxonomy for catalog loading.
//!
//! Every load failure is classified into one of four kinds so the front end
//! can render a message per kind. The kind never changes control flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CodecError;
use crate::fetch::TransportError;

/// Coarse classification of a load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Unreachable host, connection reset, or non-2xx status.
    Network,
    /// Body is not valid JSON or the blob failed to decode.
    Parse,
    /// Well-formed JSON with the wrong shape, or an unknown series.
    Format,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Format => "format",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("HTTP error {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to parse JSON for {context}: {message}")]
    Json { context: String, message: String },

    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: CodecError,
    },

    #[error("invalid data format: {0}")]
    Format(String),

    #[error("invalid series: {0}")]
    UnknownSeries(String),

    #[error("{0}")]
    Other(String),
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Status { .. } | LoadError::Transport { .. } => ErrorKind::Network,
            LoadError::Json { .. } | LoadError::Decode { .. } => ErrorKind::Parse,
            LoadError::Format(_) | LoadError::UnknownSeries(_) => ErrorKind::Format,
            LoadError::Other(_) => ErrorKind::Unknown,
        }
    }

    pub(crate) fn json(context: impl Into<String>, err: &serde_json::Error) -> Self {
        LoadError::Json {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// User-facing message for this failure, tagged with the series it affected.
    pub fn user_message(&self, series: &str) -> String {
        let suffix = if series.is_empty() {
            String::new()
        } else {
            format!(" (series: {})", series)
        };
        match self.kind() {
            ErrorKind::Network => format!("Network issue, check your connection{}", suffix),
            ErrorKind::Parse => format!("Failed to parse data{}", suffix),
            ErrorKind::Format => format!("Data format error{}", suffix),
            ErrorKind::Unknown => format!("{}{}", self, suffix),
        }
    }
}

/// A classified failure as exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl LoadFailure {
    pub fn from_error(err: &LoadError, series: &str) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(series),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let status = LoadError::Status {
            url: "x".into(),
            status: 404,
        };
        assert_eq!(status.kind(), ErrorKind::Network);
        assert_eq!(
            LoadError::Format("missing categories".into()).kind(),
            ErrorKind::Format
        );
        assert_eq!(
            LoadError::UnknownSeries("tablet".into()).kind(),
            ErrorKind::Format
        );
        assert_eq!(LoadError::Other("boom".into()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_user_message_per_kind() {
        let err = LoadError::Format("x".into());
        assert_eq!(err.user_message("desktop"), "Data format error (series: desktop)");

        let err = LoadError::Other("disk on fire".into());
        assert_eq!(err.user_message(""), "disk on fire");
    }
}
