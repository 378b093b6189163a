use thiserror::Error;

/// Every failure the library reports to its caller.
///
/// Declined confirmations and aborted runs are not errors; they surface as
/// [`crate::session::SessionOutcome::Discarded`].
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("a task needs at least one segment")]
    EmptySegments,

    #[error("invalid time table: {0}")]
    Schema(String),

    #[error("expected {expected} segment times but got {actual}")]
    RunLength { expected: usize, actual: usize },

    #[error("{0}")]
    NotMeaningful(String),

    #[error("BALANCED_BEST can't be used if the best run has any missing segments")]
    IncompleteBestRun,

    #[error("no run has a recorded final segment")]
    NoFinishedRun,

    #[error("the first run of a task must complete every segment")]
    IncompleteFirstRun,

    #[error("no segment named \"{0}\"")]
    UnknownSegment(String),

    #[error("no task named \"{0}\"")]
    UnknownTask(String),

    #[error("a task named \"{0}\" already exists")]
    TaskExists(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("input source unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("bad timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

pub type Result<T> = std::result::Result<T, SplitError>;
