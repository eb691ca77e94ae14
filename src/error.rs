use std::path::PathBuf;

/// Everything that can go wrong while building, saving or playing a script.
///
/// None of these are fatal to the session; callers report them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum AutomatorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no steps available")]
    NoStepsAvailable,
    #[error("a script is already running")]
    AlreadyRunning,
    #[error("step {index} is out of range (script has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("file error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed script file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("input injection failed: {0}")]
    InjectionFailure(String),
}

impl AutomatorError {
    pub fn invalid(msg: impl Into<String>) -> Self { Self::InvalidInput(msg.into()) }
}

pub type Result<T> = std::result::Result<T, AutomatorError>;
