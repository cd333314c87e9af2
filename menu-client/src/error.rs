use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Machine code for "the request never reached the server".
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
/// Machine code for a success status whose body could not be parsed.
pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
/// Machine code for an upload aborted by the caller.
pub const CANCELLED: &str = "CANCELLED";
/// Machine code for a request that could not be built locally.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    Network,
    Http,
    MalformedResponse,
    Cancelled,
    InvalidRequest,
}

/// Normalized failure returned by the transport, whatever the cause.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: message.into(),
            code: Some(NETWORK_ERROR.to_string()),
            status: None,
            details: None,
        }
    }

    pub fn http(message: impl Into<String>, status: u16) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: message.into(),
            code: None,
            status: Some(status),
            details: None,
        }
    }

    pub fn malformed(message: impl Into<String>, status: u16) -> Self {
        Self {
            kind: ApiErrorKind::MalformedResponse,
            message: message.into(),
            code: Some(MALFORMED_RESPONSE.to_string()),
            status: Some(status),
            details: None,
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Cancelled,
            message: message.into(),
            code: Some(CANCELLED.to_string()),
            status: None,
            details: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::InvalidRequest,
            message: message.into(),
            code: Some(INVALID_REQUEST.to_string()),
            status: None,
            details: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_network_error(&self) -> bool {
        self.kind == ApiErrorKind::Network
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self.status, Some(401) | Some(403))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self.status, Some(400) | Some(422))
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ApiErrorKind::Cancelled
    }
}

/// One schema rule broken at `path` (e.g. `categories[0].items[1].name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaErrors(pub Vec<SchemaViolation>);

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            if violation.path.is_empty() {
                write!(f, "{}", violation.message)?;
            } else {
                write!(f, "{}: {}", violation.path, violation.message)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid menu document: {0}")]
    Schema(SchemaErrors),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("No files to upload")]
    NothingToUpload,

    #[error("An upload is already in progress")]
    UploadInProgress,

    #[error("No staged file at index {index} ({len} staged)")]
    IndexOutOfRange { index: usize, len: usize },
}

impl ClientError {
    /// The transport envelope, when the failure came from the remote side.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }
}
