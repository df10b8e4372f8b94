//! Transport-level error vocabulary.

/// Errors that occur while talking to a remote party, before any
/// protocol-level interpretation of the response.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// Failed to establish a connection to the server
    #[error("connection error: {0}")]
    #[diagnostic(code(brocade::transport::connect))]
    Connect(String),

    /// Request timed out
    #[error("request timeout")]
    #[diagnostic(
        code(brocade::transport::timeout),
        help("the host controls the deadline; configure it on the HTTP client")
    )]
    Timeout,

    /// Request construction failed (malformed URI, headers, etc.)
    #[error("invalid request: {0}")]
    #[diagnostic(code(brocade::transport::invalid_request))]
    InvalidRequest(String),

    /// Other transport error
    #[error("transport error: {0}")]
    #[diagnostic(code(brocade::transport::other))]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap an arbitrary HTTP client error.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<http::Error> for TransportError {
    fn from(e: http::Error) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

#[cfg(feature = "reqwest-client")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(Box::new(e))
        }
    }
}
