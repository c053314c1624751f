//! Error kinds shared by every cutsheet crate.

/// Failure of one user action (generate, download).
///
/// `Config` is always raised before any network I/O. `Network`, `Auth` and
/// `Timeout` abort a generation but are recovered per tile while upscaling.
#[derive(Debug, thiserror::Error)]
pub enum CutsheetError {
    /// Missing or invalid API key, parameter, or selection.
    #[error("config error: {0}")]
    Config(String),

    /// The provider rejected the API key.
    #[error("auth error: {0}")]
    Auth(String),

    /// Upload, generate, upscale or fetch call failed.
    #[error("network error: {0}")]
    Network(String),

    /// Client-side deadline expired before the provider answered.
    #[error("timed out after {seconds:.1}s waiting for {what}")]
    Timeout { what: String, seconds: f64 },

    /// Bytes could not be decoded as an image, or the image cannot be tiled.
    #[error("decode error: {0}")]
    Decode(String),

    /// ZIP serialization failed.
    #[error("archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CutsheetError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Short machine-readable kind, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth(_) => "auth",
            Self::Network(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::Decode(_) => "decode",
            Self::Archive(_) => "archive",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, CutsheetError>;
