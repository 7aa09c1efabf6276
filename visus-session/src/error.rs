use crate::state::SessionStage;
use thiserror::Error;
use visus_core::HistoryError;

/// A command that does not fit the current stage. The session ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot {action} while {stage:?}")]
    NotAllowed {
        action: &'static str,
        stage: SessionStage,
    },
    #[error("a phase skip is already in progress")]
    SkipInProgress,
    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("session task has stopped")]
    Closed,
    #[error("invalid session config: {0}")]
    Config(String),
}
