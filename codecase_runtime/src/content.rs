//! Case content loading.
//!
//! Cases are authored as JSON matching the engine's `Case` type and are
//! validated before any playthrough can use them.

use std::path::{Path, PathBuf};

use tracing::debug;

use codecase_engine::domain::Case;
use codecase_engine::invariants::{validate_case, InvariantViolation};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("cannot read case file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse case: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

pub fn load_case_str(text: &str) -> Result<Case, ContentError> {
    let case: Case = serde_json::from_str(text)?;
    validate_case(&case)?;
    debug!(case = %case.id, missions = case.missions.len(), "case loaded");
    Ok(case)
}

pub fn load_case_file(path: &Path) -> Result<Case, ContentError> {
    let text = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_case_str(&text)
}
