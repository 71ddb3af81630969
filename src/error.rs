//! Pipeline-level error type.
//!
//! Per-frame failures never surface here; they are recorded as
//! [`JobOutcome`](crate::pipeline::JobOutcome)s in the run report. This type
//! covers what aborts a run or a single-image command.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the mosaicforge library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scale multiplier was zero, negative or unparseable.
    #[error("invalid scale: {0}")]
    InvalidScale(String),

    /// A transform could not produce any output.
    #[error("degenerate transform: {0}")]
    TransformDegenerate(String),

    /// A transform job failed or stalled.
    #[error("worker failure on frame {index}: {reason}")]
    WorkerFailure {
        /// Frame index of the failed job.
        index: u32,
        /// Error message or panic payload.
        reason: String,
    },

    /// An external encoder/decoder exited unsuccessfully.
    #[error("external process [{tool}]: {message}")]
    ExternalProcess {
        /// Tool that failed.
        tool: String,
        /// Exit code and stderr tail.
        message: String,
    },

    /// Configuration was rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the tile transform library.
    #[error(transparent)]
    Tiles(mosaicforge_tiles::Error),

    /// Error from the media tool library.
    #[error(transparent)]
    Av(mosaicforge_av::Error),
}

impl Error {
    /// Create an external process error.
    pub fn external(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalProcess {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<mosaicforge_tiles::Error> for Error {
    fn from(err: mosaicforge_tiles::Error) -> Self {
        match err {
            mosaicforge_tiles::Error::InvalidScale(msg) => Error::InvalidScale(msg),
            mosaicforge_tiles::Error::TransformDegenerate(msg) => Error::TransformDegenerate(msg),
            other => Error::Tiles(other),
        }
    }
}

impl From<mosaicforge_av::Error> for Error {
    fn from(err: mosaicforge_av::Error) -> Self {
        match err {
            mosaicforge_av::Error::ToolFailed { tool, code, stderr } => Error::ExternalProcess {
                message: match code {
                    Some(code) => format!("exit code {code}: {stderr}"),
                    None => format!("terminated by signal: {stderr}"),
                },
                tool,
            },
            mosaicforge_av::Error::Io(e) => Error::Io(e),
            other => Error::Av(other),
        }
    }
}
