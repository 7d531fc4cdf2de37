/// CodeCase Engine — Centralized Transition Logic
///
/// ALL progression-state mutation lives here.
/// The caller's state is never touched: each command works on a clone and
/// returns `(new_state, transition)`.
///
/// Text is loaded from mission defaults only while `pending_reset` is set.

use crate::commands::Command;
use crate::domain::{Case, EditorPane, Mission, Phase, ProgressionState, Transition};
use crate::engine::ProgressionError;
use crate::invariants::InvariantViolation;
use crate::rules::RuleRegistry;
use crate::stability::{GateOutcome, StabilityGate};

/// Everything a transition may read, plus the stability gate it may update.
pub struct Context<'a> {
    pub case: &'a Case,
    pub registry: &'a RuleRegistry,
    pub gate: &'a mut StabilityGate,
}

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Apply *command* to *state* and return `(new_state, transition)`.
pub fn apply_command(
    state: &ProgressionState,
    ctx: &mut Context<'_>,
    command: &Command,
) -> Result<(ProgressionState, Transition), ProgressionError> {
    let mut next = state.clone();
    let mut t = Transition {
        command: command.name().to_string(),
        phase_before: Some(state.phase),
        ..Default::default()
    };

    match command {
        Command::AdvanceNarrative => apply_advance_narrative(&mut next, ctx, &mut t)?,
        Command::RetreatNarrative => apply_retreat_narrative(&mut next, &t)?,
        Command::SkipToTask => apply_skip_to_task(&mut next, ctx, &mut t)?,
        Command::CompleteAndAdvance => apply_complete_and_advance(&mut next, ctx, &mut t)?,
        Command::UpdateSource { html, css } => {
            apply_update_source(&mut next, ctx, &mut t, html, css)?
        }
        Command::Evaluate => apply_evaluate(&mut next, ctx, &mut t)?,
        Command::SelectPane { pane } => apply_select_pane(&mut next, ctx, &mut t, *pane)?,
        Command::Refresh => apply_refresh(&mut next, ctx, &mut t)?,
    }

    t.phase_after = Some(next.phase);
    Ok((next, t))
}

/// Load the current mission's broken defaults if the reset flag is pending.
/// Only runs in the task phase.
pub fn load_pending_mission(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    if state.phase != Phase::Task || !state.pending_reset {
        return Ok(());
    }
    let mission = current_mission(state, ctx.case)?;
    state.html = mission.initial_html.clone();
    state.css = mission.initial_css.clone();
    state.pending_reset = false;
    ctx.gate.reset();
    t.text_reset = true;
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual transition handlers (private)
// ---------------------------------------------------------------------------

fn apply_advance_narrative(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    require_phase(state, t, Phase::Narrative)?;
    if state.beat_index + 1 < ctx.case.beats.len() {
        state.beat_index += 1;
        return Ok(());
    }
    enter_task(state, ctx, t)
}

fn apply_retreat_narrative(
    state: &mut ProgressionState,
    t: &Transition,
) -> Result<(), ProgressionError> {
    require_phase(state, t, Phase::Narrative)?;
    state.beat_index = state.beat_index.saturating_sub(1);
    Ok(())
}

fn apply_skip_to_task(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    match state.phase {
        Phase::Narrative => enter_task(state, ctx, t),
        // Already there: the learner's text stays as it is.
        Phase::Task => Ok(()),
        Phase::Resolved => Err(wrong_phase(t, state.phase)),
    }
}

fn apply_complete_and_advance(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    require_phase(state, t, Phase::Task)?;
    if !state.mission_completed {
        let mission = current_mission(state, ctx.case)?;
        return Err(ProgressionError::MissionNotCompleted {
            mission_id: mission.id.clone(),
        });
    }

    if state.mission_index >= ctx.case.last_mission_index() {
        state.phase = Phase::Resolved;
        return Ok(());
    }

    state.mission_index += 1;
    state.mission_completed = false;
    state.pending_reset = true;
    state.active_pane = EditorPane::Html;
    t.mission_advanced = true;
    load_pending_mission(state, ctx, t)
}

fn apply_update_source(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
    html: &str,
    css: &str,
) -> Result<(), ProgressionError> {
    require_phase(state, t, Phase::Task)?;
    load_pending_mission(state, ctx, t)?;
    state.html = html.to_string();
    state.css = css.to_string();
    Ok(())
}

fn apply_evaluate(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    require_phase(state, t, Phase::Task)?;
    load_pending_mission(state, ctx, t)?;

    let mission = current_mission(state, ctx.case)?;
    let outcome = ctx
        .gate
        .filter(ctx.registry, &mission.conditions, &state.html, &state.css);

    let verdict = match outcome {
        GateOutcome::Evaluated(verdict) => {
            t.evaluated = true;
            verdict
        }
        GateOutcome::Skipped { verdict, reason } => {
            t.evaluation_skipped = Some(reason.to_string());
            verdict
        }
    };

    // Completion latches; only a mission transition clears it.
    if verdict.is_completed && !state.mission_completed {
        state.mission_completed = true;
        t.mission_completed = true;
        let clue = mission.clue.clone();
        if state.reveal_clue(&clue) {
            t.clue_revealed = Some(clue);
        }
    }

    t.verdict = Some(verdict);
    Ok(())
}

fn apply_select_pane(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
    pane: EditorPane,
) -> Result<(), ProgressionError> {
    require_phase(state, t, Phase::Task)?;
    load_pending_mission(state, ctx, t)?;
    state.active_pane = pane;
    Ok(())
}

fn apply_refresh(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    load_pending_mission(state, ctx, t)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn enter_task(
    state: &mut ProgressionState,
    ctx: &mut Context<'_>,
    t: &mut Transition,
) -> Result<(), ProgressionError> {
    state.phase = Phase::Task;
    state.pending_reset = true;
    load_pending_mission(state, ctx, t)
}

fn current_mission<'c>(
    state: &ProgressionState,
    case: &'c Case,
) -> Result<&'c Mission, ProgressionError> {
    case.mission(state.mission_index).ok_or_else(|| {
        ProgressionError::Invariant(InvariantViolation::new(
            "mission_index",
            format!(
                "mission index {} out of range for {} missions",
                state.mission_index,
                case.missions.len()
            ),
        ))
    })
}

fn require_phase(
    state: &ProgressionState,
    t: &Transition,
    expected: Phase,
) -> Result<(), ProgressionError> {
    if state.phase != expected {
        return Err(wrong_phase(t, state.phase));
    }
    Ok(())
}

fn wrong_phase(t: &Transition, phase: Phase) -> ProgressionError {
    ProgressionError::WrongPhase {
        command: t.command.clone(),
        phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casebook::{missing_headline, reference_solution};
    use crate::state::create_initial_state;

    fn run(
        state: &ProgressionState,
        case: &Case,
        gate: &mut StabilityGate,
        command: Command,
    ) -> Result<(ProgressionState, Transition), ProgressionError> {
        let registry = RuleRegistry::builtin();
        let mut ctx = Context {
            case,
            registry: &registry,
            gate,
        };
        apply_command(state, &mut ctx, &command)
    }

    #[test]
    fn test_original_state_untouched() {
        let case = missing_headline();
        let mut gate = StabilityGate::new();
        let state = create_initial_state(&case);
        let (next, t) = run(&state, &case, &mut gate, Command::AdvanceNarrative).unwrap();
        assert_eq!(state.beat_index, 0);
        assert_eq!(next.beat_index, 1);
        assert!(!t.phase_changed());
    }

    #[test]
    fn test_last_beat_advances_into_task_and_loads_defaults() {
        let case = missing_headline();
        let mut gate = StabilityGate::new();
        let mut state = create_initial_state(&case);
        state.beat_index = case.beats.len() - 1;
        let (next, t) = run(&state, &case, &mut gate, Command::AdvanceNarrative).unwrap();
        assert_eq!(next.phase, Phase::Task);
        assert!(t.phase_changed());
        assert!(t.text_reset);
        assert!(!next.pending_reset);
        assert_eq!(next.html, case.missions[0].initial_html);
    }

    #[test]
    fn test_retreat_is_bounded_at_zero() {
        let case = missing_headline();
        let mut gate = StabilityGate::new();
        let state = create_initial_state(&case);
        let (next, _) = run(&state, &case, &mut gate, Command::RetreatNarrative).unwrap();
        assert_eq!(next.beat_index, 0);
    }

    #[test]
    fn test_wrong_phase_is_an_error() {
        let case = missing_headline();
        let mut gate = StabilityGate::new();
        let state = create_initial_state(&case);
        let err = run(&state, &case, &mut gate, Command::Evaluate).unwrap_err();
        assert!(matches!(
            err,
            ProgressionError::WrongPhase { phase: Phase::Narrative, .. }
        ));
    }

    #[test]
    fn test_complete_requires_completion() {
        let case = missing_headline();
        let mut gate = StabilityGate::new();
        let state = create_initial_state(&case);
        let (task, _) = run(&state, &case, &mut gate, Command::SkipToTask).unwrap();
        let err = run(&task, &case, &mut gate, Command::CompleteAndAdvance).unwrap_err();
        assert_eq!(
            err,
            ProgressionError::MissionNotCompleted {
                mission_id: "front-page".into()
            }
        );
    }

    #[test]
    fn test_evaluate_reveals_clue_once() {
        let case = missing_headline();
        let mut gate = StabilityGate::new();
        let state = create_initial_state(&case);
        let (task, _) = run(&state, &case, &mut gate, Command::SkipToTask).unwrap();
        let (html, css) = reference_solution("front-page").unwrap();
        let (edited, _) = run(
            &task,
            &case,
            &mut gate,
            Command::UpdateSource {
                html: html.into(),
                css: css.into(),
            },
        )
        .unwrap();

        let (done, t) = run(&edited, &case, &mut gate, Command::Evaluate).unwrap();
        assert!(done.mission_completed);
        assert!(t.mission_completed);
        assert_eq!(t.clue_revealed.as_deref(), Some(case.missions[0].clue.as_str()));

        let (again, t2) = run(&done, &case, &mut gate, Command::Evaluate).unwrap();
        assert!(!t2.mission_completed);
        assert_eq!(t2.clue_revealed, None);
        assert_eq!(again.revealed_clues.len(), 1);
    }
}
