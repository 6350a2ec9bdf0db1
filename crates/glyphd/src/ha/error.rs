/// Errors from the state API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Not configured")]
    NotConfigured,

    /// The request never produced a response.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server answered outside 2xx.
    #[error("HTTP {code}: {message}")]
    Http { code: u16, message: String },

    /// The response body was not what we expected.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Network-level failure, as opposed to a protocol-level one.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Connection(_))
    }
}
