use thiserror::Error;

/// All errors produced by soundbeat-core.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("sample source error: {0}")]
    Source(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("metering run is already active")]
    AlreadyRunning,

    #[error("no metering run is active")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`MeterError`], used by callers that decide
/// whether a failure came from setup, input, or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Source,
    Sink,
    Other,
}

impl MeterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeterError::Config(_) => ErrorKind::Config,
            MeterError::Source(_) | MeterError::Io(_) => ErrorKind::Source,
            MeterError::Sink(_) => ErrorKind::Sink,
            MeterError::AlreadyRunning | MeterError::NotRunning | MeterError::Other(_) => {
                ErrorKind::Other
            }
        }
    }
}

impl MeterError {
    /// Same variant and message as `self`, for handing one failure to two
    /// owners. Wrapped `io`/`anyhow` errors keep their text but not their chain.
    pub fn duplicate(&self) -> MeterError {
        match self {
            MeterError::Config(msg) => MeterError::Config(msg.clone()),
            MeterError::Source(msg) => MeterError::Source(msg.clone()),
            MeterError::Sink(msg) => MeterError::Sink(msg.clone()),
            MeterError::AlreadyRunning => MeterError::AlreadyRunning,
            MeterError::NotRunning => MeterError::NotRunning,
            MeterError::Io(e) => MeterError::Io(std::io::Error::new(e.kind(), e.to_string())),
            MeterError::Other(e) => MeterError::Other(anyhow::anyhow!("{e:#}")),
        }
    }
}

/// Terminal failure of a metering run.
///
/// Records published before the failure are not rolled back, so the count is
/// carried alongside the cause.
#[derive(Debug, Error)]
#[error("{error} ({blocks_emitted} records published before failure)")]
pub struct RunError {
    #[source]
    pub error: MeterError,
    pub blocks_emitted: u64,
}

impl RunError {
    pub fn new(error: MeterError, blocks_emitted: u64) -> Self {
        Self {
            error,
            blocks_emitted,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

pub type Result<T> = std::result::Result<T, MeterError>;
