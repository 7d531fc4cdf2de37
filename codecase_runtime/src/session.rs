//! Session manager — one playthrough with apply-before-persist semantics.
//!
//! Each persistent playthrough owns one journal file:
//!   <journal_dir>/<playthrough_id>.journal
//!
//! Apply-before-persist order:
//!   1. candidate.apply_envelope(envelope)  — on a clone, may reject
//!   2. journal.append(envelope)            — only if step 1 succeeded
//!   3. the candidate replaces the engine   — only if step 2 succeeded

use std::path::{Path, PathBuf};

use tracing::info;

use codecase_engine::commands::{Command, CommandEnvelope};
use codecase_engine::domain::{HintRecord, Phase, ProgressionState, Transition, ValidationVerdict};
use codecase_engine::engine::PlaythroughEngine;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::journal::Journal;

/// One playthrough of one case, optionally journaled.
#[derive(Debug)]
pub struct Session {
    playthrough_id: String,
    engine: PlaythroughEngine,
    journal: Option<Journal>,
}

impl Session {
    /// A playthrough that lives only as long as the process.
    pub fn in_memory(playthrough_id: &str, engine: PlaythroughEngine) -> Self {
        Self {
            playthrough_id: playthrough_id.to_string(),
            engine,
            journal: None,
        }
    }

    /// Open or resume the journaled playthrough `playthrough_id` in `dir`.
    ///
    /// `engine` must be fresh; existing journal entries are replayed into it.
    pub fn open(
        dir: &Path,
        playthrough_id: &str,
        mut engine: PlaythroughEngine,
    ) -> Result<Self, RuntimeError> {
        let journal = Journal::open(&journal_path(dir, playthrough_id))?;
        let commands = journal.load_all()?;
        if !commands.is_empty() {
            engine.replay(&commands)?;
            info!(
                playthrough = playthrough_id,
                commands = commands.len(),
                phase = %engine.state().phase,
                "playthrough resumed"
            );
        }
        Ok(Self {
            playthrough_id: playthrough_id.to_string(),
            engine,
            journal: Some(journal),
        })
    }

    /// Journaled when the config names a journal directory, in memory
    /// otherwise.
    pub fn start(
        config: &RuntimeConfig,
        playthrough_id: &str,
        engine: PlaythroughEngine,
    ) -> Result<Self, RuntimeError> {
        match &config.journal_dir {
            Some(dir) => Self::open(dir, playthrough_id, engine),
            None => Ok(Self::in_memory(playthrough_id, engine)),
        }
    }

    /// Apply a command under the next sequence number, then journal it.
    pub fn apply(&mut self, command: Command) -> Result<Transition, RuntimeError> {
        let envelope = CommandEnvelope::new(self.engine.last_sequence() + 1, command);

        let mut candidate = self.engine.clone();
        let transition = candidate.apply_envelope(&envelope)?;

        if let Some(journal) = self.journal.as_mut() {
            journal.append(&envelope)?;
        }
        self.engine = candidate;

        if transition.phase_changed() && transition.phase_after == Some(Phase::Resolved) {
            info!(playthrough = %self.playthrough_id, "case resolved");
        }
        Ok(transition)
    }

    /// Delete the journal. The playthrough's progression state goes with it.
    pub fn discard(self) -> Result<(), RuntimeError> {
        if let Some(journal) = self.journal {
            journal.remove()?;
        }
        info!(playthrough = %self.playthrough_id, "playthrough discarded");
        Ok(())
    }

    pub fn state(&self) -> &ProgressionState {
        self.engine.state()
    }

    pub fn verdict(&self) -> Option<&ValidationVerdict> {
        self.engine.verdict()
    }

    pub fn hint(&self) -> Option<HintRecord> {
        self.engine.hint()
    }

    pub fn current_hash(&self) -> String {
        self.engine.current_hash()
    }

    pub fn current_sequence(&self) -> u64 {
        self.engine.last_sequence()
    }

    pub fn engine(&self) -> &PlaythroughEngine {
        &self.engine
    }

    pub fn playthrough_id(&self) -> &str {
        &self.playthrough_id
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_ref().map(Journal::path)
    }
}

pub fn journal_path(dir: &Path, playthrough_id: &str) -> PathBuf {
    dir.join(format!("{}.journal", playthrough_id))
}
