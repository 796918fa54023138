/// Errors that can occur at the wire codec boundary.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The input ended before a complete value could be read.
    #[error("truncated input (needed {needed} bytes, {remaining} remaining)")]
    Truncated { needed: usize, remaining: usize },

    /// Object payload (de)serialization failed.
    #[error("marshalling failed: {0}")]
    Marshal(String),
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Marshal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
