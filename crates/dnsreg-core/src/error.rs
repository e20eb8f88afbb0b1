//! Error types for the registration backend
//!
//! Two families live in one enum:
//! - **Domain errors** returned to callers of the engine (grammar violations,
//!   ownership failures, duplicate registrations)
//! - **Infrastructure errors** raised by stores and zone providers
//!
//! [`Error::kind`] collapses the second family onto [`ErrorKind::Internal`]
//! so a transport layer only ever has to map the caller-facing taxonomy.

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Hostname does not match the main-zone grammar
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// A sub-zone label does not match the sub-hostname grammar
    #[error("Invalid sub hostname: {0}")]
    InvalidSubHostname(String),

    /// Hostname is on the configured deny-list
    #[error("Hostname is blacklisted: {0}")]
    Blacklisted(String),

    /// Create attempted on a hostname that already has a Host
    #[error("Host already registered: {0}")]
    AlreadyRegistered(String),

    /// Token supplied on re-register does not match the stored token
    #[error("Wrong token")]
    WrongToken,

    /// No Host matches the supplied token
    #[error("Unknown token")]
    UnknownToken,

    /// Challenge requested for a name the token does not control
    #[error("Domain not owned by token: {0}")]
    DomainNotOwned(String),

    /// A required field is empty
    #[error("Bad input: {0}")]
    BadInput(String),

    /// Operation failed after side effects were rolled back
    #[error("Internal error: {0}")]
    Internal(String),

    /// Zone provider errors
    #[error("Zone provider error: {0}")]
    ZoneProvider(String),

    /// Host store errors
    #[error("Host store error: {0}")]
    HostStore(String),

    /// Record or row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidHostname,
    InvalidSubHostname,
    Blacklisted,
    AlreadyRegistered,
    WrongToken,
    UnknownToken,
    DomainNotOwned,
    BadInput,
    Internal,
}

impl Error {
    /// Classify this error for the transport layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHostname(_) => ErrorKind::InvalidHostname,
            Error::InvalidSubHostname(_) => ErrorKind::InvalidSubHostname,
            Error::Blacklisted(_) => ErrorKind::Blacklisted,
            Error::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            Error::WrongToken => ErrorKind::WrongToken,
            Error::UnknownToken => ErrorKind::UnknownToken,
            Error::DomainNotOwned(_) => ErrorKind::DomainNotOwned,
            Error::BadInput(_) => ErrorKind::BadInput,
            _ => ErrorKind::Internal,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a zone provider error
    pub fn zone_provider(msg: impl Into<String>) -> Self {
        Self::ZoneProvider(msg.into())
    }

    /// Create a host store error
    pub fn host_store(msg: impl Into<String>) -> Self {
        Self::HostStore(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a bad input error
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_surface_as_internal() {
        assert_eq!(Error::zone_provider("down").kind(), ErrorKind::Internal);
        assert_eq!(Error::host_store("locked").kind(), ErrorKind::Internal);
        assert_eq!(Error::timeout("get_zone").kind(), ErrorKind::Internal);
        assert_eq!(Error::provider("powerdns", "422").kind(), ErrorKind::Internal);
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        assert_eq!(Error::WrongToken.kind(), ErrorKind::WrongToken);
        assert_eq!(
            Error::DomainNotOwned("cam9".into()).kind(),
            ErrorKind::DomainNotOwned
        );
        assert_eq!(Error::bad_input("empty").kind(), ErrorKind::BadInput);
    }
}
