/**
 * file: error.rs
 * desc: Error types used by both binaries.
 */
use std::path::PathBuf;

/**
 * Everything that can go wrong during a simulation or training run. Per-record policy
 * outcomes (rejected or zero length fragments) are not errors and never show up here.
 */
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    // A required parameter or resource is missing or invalid, raised before any work starts
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    // A single malformed record, callers usually log these and move on
    #[error("parse error in {context}: {message}")]
    Parse { context: String, message: String },

    // The model artifact could not be written or did not survive a reload
    #[error("model persistence error: {0}")]
    Persistence(String),

    #[error("stage {stage} failed: {message}")]
    Stage { stage: String, message: String },
}

impl SimError {
    /**
     * Wrap an io::Error along with the path that caused it.
     */
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}
