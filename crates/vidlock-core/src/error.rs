//! Unified error type for the vidlock processor.
//!
//! All library crates funnel their failures into [`Error`]. Whole-asset stage
//! failures are wrapped in [`Error::Pipeline`] carrying the stage tag, so the
//! run entry point can report which stage aborted the run.

/// Unified error type covering all failure modes in vidlock.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A whole-asset pipeline stage failed and the run was aborted.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline {
        /// The stage that failed ("fetch", "watermark", "split").
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// The message transport (cursor, pull, ack) failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Key generation or sealing failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The secrets store rejected or failed a key write.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// The content store rejected or failed an upload.
    #[error("Upload error: {0}")]
    Upload(String),

    /// Publishing an event to the bus failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transport`].
    pub fn transport(message: impl std::fmt::Display) -> Self {
        Error::Transport(message.to_string())
    }

    /// Convenience constructor for [`Error::Publish`].
    pub fn publish(message: impl std::fmt::Display) -> Self {
        Error::Publish(message.to_string())
    }

    /// Wrap this error as a stage abort, keeping the original message.
    ///
    /// An error that is already a [`Error::Pipeline`] keeps its inner step
    /// in the message so the outermost tag is always the failing stage.
    pub fn in_stage(self, step: &str) -> Self {
        Error::Pipeline {
            step: step.to_string(),
            message: self.to_string(),
        }
    }

    /// The stage tag for [`Error::Pipeline`] errors.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Error::Pipeline { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
