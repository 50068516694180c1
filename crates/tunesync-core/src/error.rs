use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Signature '{0}' could not be resolved")]
    SignatureUnresolved(String),

    #[error("Remote access denied at address {address:#x}: {message}")]
    RemoteAccessDenied { address: u64, message: String },

    #[error("Malformed auxiliary data: {0}")]
    MalformedAuxiliaryData(String),

    #[error("Transport failure: {0}")]
    TransientTransport(String),

    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by the orchestrator to decide how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TargetNotFound,
    SignatureUnresolved,
    RemoteAccessDenied,
    MalformedAuxiliaryData,
    TransientTransport,
    Configuration,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TargetNotFound(_) => ErrorKind::TargetNotFound,
            Error::SignatureUnresolved(_) => ErrorKind::SignatureUnresolved,
            Error::RemoteAccessDenied { .. } => ErrorKind::RemoteAccessDenied,
            Error::MalformedAuxiliaryData(_) | Error::Json(_) => ErrorKind::MalformedAuxiliaryData,
            Error::TransientTransport(_) | Error::Io(_) => ErrorKind::TransientTransport,
            Error::InvalidPattern(_) | Error::ConfigParse(_) => ErrorKind::Configuration,
        }
    }

    /// Whether this failure should mark its source as denied until the process restarts.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RemoteAccessDenied | ErrorKind::SignatureUnresolved
        )
    }

    pub(crate) fn remote(address: u64, message: impl Into<String>) -> Self {
        Error::RemoteAccessDenied {
            address,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Error::MalformedAuxiliaryData(format!("Undecodable response body: {}", e));
        }
        let message = if e.is_timeout() {
            format!("Request timed out: {}", e)
        } else if e.is_connect() {
            format!("Connection failed: {}", e)
        } else if let Some(status) = e.status() {
            format!("HTTP {} error: {}", status.as_u16(), e)
        } else {
            format!("HTTP error: {}", e)
        };
        Error::TransientTransport(message)
    }
}
