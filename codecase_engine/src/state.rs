/// CodeCase Engine — State Construction

use crate::domain::{Case, EditorPane, Phase, ProgressionState};

/// Fresh state for a new playthrough of `case`.
///
/// A case without narrative beats starts directly in the task phase. The
/// reset flag is always set so the first task-phase entry loads the mission
/// defaults.
pub fn create_initial_state(case: &Case) -> ProgressionState {
    let phase = if case.beats.is_empty() {
        Phase::Task
    } else {
        Phase::Narrative
    };

    ProgressionState {
        case_id: case.id.clone(),
        phase,
        beat_index: 0,
        mission_index: 0,
        html: String::new(),
        css: String::new(),
        revealed_clues: Vec::new(),
        mission_completed: false,
        pending_reset: true,
        active_pane: EditorPane::default(),
    }
}
