/// Convenience result type used across flipbook.
pub type FlipbookResult<T> = Result<T, FlipbookError>;

/// Top-level error taxonomy of the export pipeline.
///
/// `Load` is the only recoverable kind: a layer image that fails to load is omitted and the
/// session carries on. Every other kind aborts the active export session.
#[derive(thiserror::Error, Debug)]
pub enum FlipbookError {
    /// Malformed or unsupported animated image.
    #[error("decode error: {0}")]
    Decode(String),

    /// A layer image could not be read or decoded.
    #[error("load error: {0}")]
    Load(String),

    /// Stream or encoder fault while recording.
    #[error("capture error: {0}")]
    Capture(String),

    /// Codec engine fault or unsupported transcode input.
    #[error("transcode error: {0}")]
    Transcode(String),

    /// One-time codec engine setup failed.
    #[error("codec engine init error: {0}")]
    Init(String),

    /// Invalid user-provided configuration or input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The animation service rejected a request or was unreachable.
    #[error("animation service error: {0}")]
    Remote(String),

    /// The session was torn down by a "start over" request.
    #[error("export session cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`FlipbookError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`FlipbookError::Decode`].
    Decode,
    /// See [`FlipbookError::Load`].
    Load,
    /// See [`FlipbookError::Capture`].
    Capture,
    /// See [`FlipbookError::Transcode`].
    Transcode,
    /// See [`FlipbookError::Init`].
    Init,
    /// See [`FlipbookError::Validation`].
    Validation,
    /// See [`FlipbookError::Remote`].
    Remote,
    /// See [`FlipbookError::Cancelled`].
    Cancelled,
    /// See [`FlipbookError::Other`].
    Other,
}

impl FlipbookError {
    /// Build a [`FlipbookError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`FlipbookError::Load`] value.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Build a [`FlipbookError::Capture`] value.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`FlipbookError::Transcode`] value.
    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    /// Build a [`FlipbookError::Init`] value.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Build a [`FlipbookError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FlipbookError::Remote`] value.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Load(_) => ErrorKind::Load,
            Self::Capture(_) => ErrorKind::Capture,
            Self::Transcode(_) => ErrorKind::Transcode,
            Self::Init(_) => ErrorKind::Init,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Remote(_) => ErrorKind::Remote,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Short human-readable message for the end user.
    ///
    /// The raw `Display` output stays available for diagnostics.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Decode(_) => "The animation could not be read. Try generating it again.",
            Self::Load(_) => "A background or overlay image could not be loaded.",
            Self::Capture(_) => "Recording the video failed. Please start over.",
            Self::Transcode(_) => "Converting the animation failed. Please start over.",
            Self::Init(_) => "The video encoder is unavailable. Reload to try again.",
            Self::Validation(_) => "Some export settings are invalid.",
            Self::Remote(_) => "The animation service could not process the drawing.",
            Self::Cancelled => "The export was cancelled.",
            Self::Other(_) => "Something went wrong while exporting.",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
