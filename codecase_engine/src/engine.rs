/// CodeCase Engine — Playthrough Engine
///
/// Top-level orchestrator for one playthrough of one case. Delegates
/// mutation to transitions, validates via invariants.
///
/// Strict sequence enforcement. Collaborators (rule registry, hint
/// resolver) are injected; the engine owns its stability gate.

use std::sync::Arc;

use tracing::{debug, info};

use crate::commands::{Command, CommandEnvelope, SCHEMA_VERSION};
use crate::domain::{
    Case, EditorPane, HintRecord, Mission, Phase, ProgressionState, Transition, ValidationVerdict,
};
use crate::hashing::canonical_hash;
use crate::hints::HintResolver;
use crate::invariants::{validate_case, validate_progression, InvariantViolation};
use crate::rules::RuleRegistry;
use crate::stability::StabilityGate;
use crate::state::create_initial_state;
use crate::transitions::{apply_command, load_pending_mission, Context};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgressionError {
    #[error("{command} is not allowed in the {phase} phase")]
    WrongPhase { command: String, phase: Phase },
    #[error("mission {mission_id:?} is not completed yet")]
    MissionNotCompleted { mission_id: String },
    #[error("sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaVersion { expected: u32, got: u32 },
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Stateful engine wrapping the pure transition layer.
#[derive(Debug, Clone)]
pub struct PlaythroughEngine {
    case: Arc<Case>,
    registry: Arc<RuleRegistry>,
    hints: Arc<HintResolver>,
    gate: StabilityGate,
    state: ProgressionState,
    verdict: Option<ValidationVerdict>,
    last_sequence: u64,
}

impl PlaythroughEngine {
    /// Start a fresh playthrough. The case is validated first.
    pub fn new(
        case: Arc<Case>,
        registry: Arc<RuleRegistry>,
        hints: Arc<HintResolver>,
    ) -> Result<Self, ProgressionError> {
        validate_case(&case)?;
        let mut engine = Self {
            state: create_initial_state(&case),
            case,
            registry,
            hints,
            gate: StabilityGate::new(),
            verdict: None,
            last_sequence: 0,
        };
        engine.enter_initial_phase()?;
        Ok(engine)
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn case(&self) -> &Case {
        &self.case
    }

    pub fn case_handle(&self) -> Arc<Case> {
        Arc::clone(&self.case)
    }

    pub fn registry(&self) -> Arc<RuleRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn hint_resolver(&self) -> Arc<HintResolver> {
        Arc::clone(&self.hints)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Latest verdict for the current mission, if it has been evaluated.
    pub fn verdict(&self) -> Option<&ValidationVerdict> {
        self.verdict.as_ref()
    }

    pub fn current_mission(&self) -> Option<&Mission> {
        self.case.mission(self.state.mission_index)
    }

    /// Hint for the current task text. None outside the task phase.
    pub fn hint(&self) -> Option<HintRecord> {
        if self.state.phase != Phase::Task {
            return None;
        }
        let mission = self.current_mission()?;
        Some(self.hints.resolve(mission, &self.state.html, &self.state.css))
    }

    pub fn current_hash(&self) -> String {
        canonical_hash(&self.state)
    }

    /// Apply a command under the next sequence number.
    pub fn apply(&mut self, command: Command) -> Result<Transition, ProgressionError> {
        let envelope = CommandEnvelope::new(self.last_sequence + 1, command);
        self.apply_envelope(&envelope)
    }

    /// Apply a single envelope:
    ///   1. Validate schema version (must be 1)
    ///   2. Validate sequence (strictly increasing, no gaps)
    ///   3. Delegate to transitions::apply_command
    ///   4. Validate invariants on the new state
    ///   5. Commit and return
    pub fn apply_envelope(
        &mut self,
        envelope: &CommandEnvelope,
    ) -> Result<Transition, ProgressionError> {
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(ProgressionError::SchemaVersion {
                expected: SCHEMA_VERSION,
                got: envelope.schema_version,
            });
        }

        let expected = self.last_sequence + 1;
        if envelope.sequence != expected {
            return Err(ProgressionError::SequenceViolation {
                expected,
                got: envelope.sequence,
            });
        }

        let mut gate = self.gate.clone();
        let (next, transition) = {
            let mut ctx = Context {
                case: &self.case,
                registry: &self.registry,
                gate: &mut gate,
            };
            apply_command(&self.state, &mut ctx, &envelope.command)?
        };
        validate_progression(&next, &self.case)?;

        self.state = next;
        self.gate = gate;
        self.last_sequence = envelope.sequence;
        if transition.text_reset {
            self.verdict = None;
        }
        if let Some(verdict) = &transition.verdict {
            self.verdict = Some(verdict.clone());
        }

        self.log_transition(&transition);
        Ok(transition)
    }

    /// Reset to a fresh playthrough and replay `envelopes` in order.
    pub fn replay(
        &mut self,
        envelopes: &[CommandEnvelope],
    ) -> Result<&ProgressionState, ProgressionError> {
        self.state = create_initial_state(&self.case);
        self.gate.reset();
        self.verdict = None;
        self.last_sequence = 0;
        self.enter_initial_phase()?;
        for envelope in envelopes {
            self.apply_envelope(envelope)?;
        }
        Ok(&self.state)
    }

    // -- command surface ---------------------------------------------------

    pub fn advance_narrative(&mut self) -> Result<Transition, ProgressionError> {
        self.apply(Command::AdvanceNarrative)
    }

    pub fn retreat_narrative(&mut self) -> Result<Transition, ProgressionError> {
        self.apply(Command::RetreatNarrative)
    }

    pub fn skip_to_task(&mut self) -> Result<Transition, ProgressionError> {
        self.apply(Command::SkipToTask)
    }

    pub fn complete_and_advance(&mut self) -> Result<Transition, ProgressionError> {
        self.apply(Command::CompleteAndAdvance)
    }

    pub fn update_source(
        &mut self,
        html: impl Into<String>,
        css: impl Into<String>,
    ) -> Result<Transition, ProgressionError> {
        self.apply(Command::UpdateSource {
            html: html.into(),
            css: css.into(),
        })
    }

    pub fn evaluate(&mut self) -> Result<Transition, ProgressionError> {
        self.apply(Command::Evaluate)
    }

    pub fn select_pane(&mut self, pane: EditorPane) -> Result<Transition, ProgressionError> {
        self.apply(Command::SelectPane { pane })
    }

    pub fn refresh(&mut self) -> Result<Transition, ProgressionError> {
        self.apply(Command::Refresh)
    }

    /// Replace the text and evaluate immediately, for hosts without a timer.
    /// Returns the evaluation's transition.
    pub fn update_source_and_evaluate(
        &mut self,
        html: impl Into<String>,
        css: impl Into<String>,
    ) -> Result<Transition, ProgressionError> {
        self.update_source(html, css)?;
        self.evaluate()
    }

    // -- internals ---------------------------------------------------------

    /// A case without beats starts in the task phase and needs its defaults
    /// loaded before the first command.
    fn enter_initial_phase(&mut self) -> Result<(), ProgressionError> {
        let mut entry = Transition::default();
        let mut ctx = Context {
            case: &self.case,
            registry: &self.registry,
            gate: &mut self.gate,
        };
        load_pending_mission(&mut self.state, &mut ctx, &mut entry)?;
        validate_progression(&self.state, &self.case)?;
        Ok(())
    }

    fn log_transition(&self, t: &Transition) {
        if t.phase_changed() {
            info!(
                case = %self.case.id,
                command = %t.command,
                from = ?t.phase_before,
                to = ?t.phase_after,
                "phase transition"
            );
        }
        if t.mission_advanced {
            info!(
                case = %self.case.id,
                mission_index = self.state.mission_index,
                "advanced to next mission"
            );
        }
        if t.mission_completed {
            info!(
                case = %self.case.id,
                mission_index = self.state.mission_index,
                "mission completed"
            );
        }
        if let Some(clue) = &t.clue_revealed {
            info!(case = %self.case.id, clue = %clue, "clue revealed");
        }
        if let Some(reason) = &t.evaluation_skipped {
            debug!(case = %self.case.id, reason = %reason, "evaluation skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casebook::{builtin_engine, builtin_hints, missing_headline};
    use crate::commands::sequence_commands;

    #[test]
    fn test_sequence_gap_rejected() {
        let mut engine = builtin_engine().unwrap();
        let err = engine
            .apply_envelope(&CommandEnvelope::new(2, Command::SkipToTask))
            .unwrap_err();
        assert_eq!(err, ProgressionError::SequenceViolation { expected: 1, got: 2 });
        assert_eq!(engine.last_sequence(), 0);
    }

    #[test]
    fn test_schema_version_rejected() {
        let mut engine = builtin_engine().unwrap();
        let mut env = CommandEnvelope::new(1, Command::SkipToTask);
        env.schema_version = 2;
        assert!(matches!(
            engine.apply_envelope(&env),
            Err(ProgressionError::SchemaVersion { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_rejected_command_leaves_state() {
        let mut engine = builtin_engine().unwrap();
        let before = engine.state().clone();
        assert!(engine.evaluate().is_err());
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.last_sequence(), 0);
    }

    #[test]
    fn test_replay_matches_live_hash() {
        let mut live = builtin_engine().unwrap();
        live.skip_to_task().unwrap();
        live.update_source_and_evaluate("<h1>The Daily Byte</h1>", "").unwrap();
        let live_hash = live.current_hash();

        let envs = sequence_commands(vec![
            Command::SkipToTask,
            Command::UpdateSource {
                html: "<h1>The Daily Byte</h1>".into(),
                css: String::new(),
            },
            Command::Evaluate,
        ]);
        let mut replayed = builtin_engine().unwrap();
        replayed.replay(&envs).unwrap();
        assert_eq!(replayed.current_hash(), live_hash);
    }

    #[test]
    fn test_hint_only_in_task_phase() {
        let mut engine = builtin_engine().unwrap();
        assert!(engine.hint().is_none());
        engine.skip_to_task().unwrap();
        let hint = engine.hint().unwrap();
        assert_eq!(hint.id, "front-page:center");
    }

    #[test]
    fn test_case_without_beats_starts_in_task() {
        let mut case = missing_headline();
        case.beats.clear();
        let engine = PlaythroughEngine::new(
            Arc::new(case),
            Arc::new(RuleRegistry::builtin()),
            Arc::new(builtin_hints()),
        )
        .unwrap();
        assert_eq!(engine.state().phase, Phase::Task);
        assert!(!engine.state().pending_reset);
        assert_eq!(engine.state().html, engine.case().missions[0].initial_html);
    }
}
