//! Runtime error umbrella.

use codecase_engine::engine::ProgressionError;

use crate::config::ConfigError;
use crate::content::ContentError;
use crate::journal::JournalError;
use crate::unlock::UnlockError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Unlock(#[from] UnlockError),
    #[error("playthrough task has stopped")]
    Closed,
}
