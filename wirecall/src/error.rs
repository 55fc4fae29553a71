/// Result type for wirecall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for wirecall operations.
///
/// Business-level failures are deliberately not in this enum: `service not
/// found`, `method not found`, `unsupported serializer code` and errors
/// returned by service methods all travel as plain text inside a well-formed
/// response frame and surface through [`crate::Reply`] as a [`ServiceError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A name, meta entry, or registration was malformed. Raised at setup or
    /// when building a request, never by the remote side.
    #[error("validation failure: {0}")]
    Validation(String),
    /// Payload encode or decode failed. The call fails but the connection
    /// stays usable.
    #[error("serialization failure: {0}")]
    Serialization(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// Dialing, pool acquisition, frame io, or response framing failed. The
    /// connection is discarded rather than pooled.
    #[error("connection failure: {0}")]
    Connection(#[from] std::io::Error),
    /// The call's deadline expired before a response arrived. Raised locally;
    /// the server-side handler may still be running.
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    /// Returned locally by every oneway call: the wire protocol offers no way
    /// to tell a suppressed reply from a slow one, so a oneway call never has
    /// a result to consume.
    #[error("oneway calls must not consume a result")]
    OnewayResult,
}

/// A business-level error produced by a remote method.
///
/// Only the message crosses the wire: the original error type on the server
/// is reduced to its text, and the client reconstructs this carrier from it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    /// Wrap an error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error text as it travelled on the wire.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ServiceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ServiceError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
