//! Replay orchestrator — rebuild a playthrough from its journal.
//!
//! Delegates all progression logic to the engine.
//! No shortcuts, no cached state logic.

use std::path::Path;
use std::sync::Arc;

use codecase_engine::casebook::builtin_hints;
use codecase_engine::commands::CommandEnvelope;
use codecase_engine::domain::{Case, ProgressionState};
use codecase_engine::engine::PlaythroughEngine;
use codecase_engine::rules::RuleRegistry;

use crate::error::RuntimeError;
use crate::journal::Journal;

/// Rebuild the progression state of `case` from a command stream.
///
/// 1. Create a fresh engine with the built-in rules
/// 2. Pass each envelope sequentially to the engine
/// 3. Return (final_state, canonical_hash)
pub fn rebuild_playthrough(
    case: Arc<Case>,
    commands: &[CommandEnvelope],
) -> Result<(ProgressionState, String), RuntimeError> {
    let mut engine = PlaythroughEngine::new(
        case,
        Arc::new(RuleRegistry::builtin()),
        Arc::new(builtin_hints()),
    )?;
    engine.replay(commands)?;
    let hash = engine.current_hash();
    Ok((engine.state().clone(), hash))
}

/// Load a journal file and rebuild it against `case`.
pub fn rebuild_from_journal(
    case: Arc<Case>,
    path: &Path,
) -> Result<(ProgressionState, String), RuntimeError> {
    let commands = Journal::open(path)?.load_all()?;
    rebuild_playthrough(case, &commands)
}
