/// CodeCase Engine — Invariant Checks
///
/// Every check returns `Err(InvariantViolation)` on the first failure.
/// Case checks run once when content is loaded; progression checks run after
/// every applied command.

use std::collections::BTreeSet;

use crate::domain::{Case, Phase, ProgressionState};
use crate::ledger::LedgerState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invariant violation: [INVARIANT:{rule}] {detail}")]
pub struct InvariantViolation {
    pub rule: &'static str,
    pub detail: String,
}

impl InvariantViolation {
    pub fn new(rule: &'static str, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn validate_case(case: &Case) -> Result<(), InvariantViolation> {
    check_case_has_missions(case)?;
    check_content_id_format(case)?;
    check_unique_mission_ids(case)?;
    check_missions_have_conditions(case)?;
    check_reward_non_negative(case)?;
    Ok(())
}

pub fn validate_progression(state: &ProgressionState, case: &Case) -> Result<(), InvariantViolation> {
    check_case_binding(state, case)?;
    check_beat_index(state, case)?;
    check_mission_index(state, case)?;
    check_unique_clues(state)?;
    check_resolved_is_complete(state, case)?;
    Ok(())
}

pub fn validate_ledger(ledger: &LedgerState) -> Result<(), InvariantViolation> {
    if ledger.point_balance < 0 {
        return Err(InvariantViolation::new(
            "negative_balance",
            format!("point balance {} is below zero", ledger.point_balance),
        ));
    }
    if ledger.unlocked_ids.iter().any(|id| id.is_empty()) {
        return Err(InvariantViolation::new(
            "empty_unlocked_id",
            "unlocked ids contain an empty string",
        ));
    }
    Ok(())
}

/// `[a-z0-9_-]+`
pub fn is_valid_content_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
}

// ---------------------------------------------------------------------------
// Case checks
// ---------------------------------------------------------------------------

fn check_case_has_missions(case: &Case) -> Result<(), InvariantViolation> {
    if case.missions.is_empty() {
        return Err(InvariantViolation::new(
            "no_missions",
            format!("case {:?} has no missions", case.id),
        ));
    }
    Ok(())
}

fn check_content_id_format(case: &Case) -> Result<(), InvariantViolation> {
    let ids = std::iter::once(case.id.as_str())
        .chain(case.beats.iter().map(|b| b.id.as_str()))
        .chain(case.missions.iter().map(|m| m.id.as_str()));
    for id in ids {
        if !is_valid_content_id(id) {
            return Err(InvariantViolation::new(
                "content_id_format",
                format!("id {:?} must match [a-z0-9_-]+", id),
            ));
        }
    }
    Ok(())
}

fn check_unique_mission_ids(case: &Case) -> Result<(), InvariantViolation> {
    let mut seen = BTreeSet::new();
    for mission in &case.missions {
        if !seen.insert(mission.id.as_str()) {
            return Err(InvariantViolation::new(
                "duplicate_mission_id",
                format!("mission id {:?} appears more than once", mission.id),
            ));
        }
    }
    Ok(())
}

fn check_missions_have_conditions(case: &Case) -> Result<(), InvariantViolation> {
    for mission in &case.missions {
        if mission.conditions.is_empty() {
            return Err(InvariantViolation::new(
                "empty_conditions",
                format!("mission {:?} has no success conditions", mission.id),
            ));
        }
    }
    Ok(())
}

fn check_reward_non_negative(case: &Case) -> Result<(), InvariantViolation> {
    if case.reward_points < 0 {
        return Err(InvariantViolation::new(
            "negative_reward",
            format!("case {:?} reward {} is below zero", case.id, case.reward_points),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progression checks
// ---------------------------------------------------------------------------

fn check_case_binding(state: &ProgressionState, case: &Case) -> Result<(), InvariantViolation> {
    if state.case_id != case.id {
        return Err(InvariantViolation::new(
            "case_binding",
            format!("state belongs to {:?}, not {:?}", state.case_id, case.id),
        ));
    }
    Ok(())
}

fn check_beat_index(state: &ProgressionState, case: &Case) -> Result<(), InvariantViolation> {
    let max = case.beats.len().saturating_sub(1);
    if state.beat_index > max {
        return Err(InvariantViolation::new(
            "beat_index",
            format!("beat index {} exceeds last beat {}", state.beat_index, max),
        ));
    }
    Ok(())
}

fn check_mission_index(state: &ProgressionState, case: &Case) -> Result<(), InvariantViolation> {
    if state.mission_index >= case.missions.len() {
        return Err(InvariantViolation::new(
            "mission_index",
            format!(
                "mission index {} out of range for {} missions",
                state.mission_index,
                case.missions.len()
            ),
        ));
    }
    Ok(())
}

fn check_unique_clues(state: &ProgressionState) -> Result<(), InvariantViolation> {
    let unique: BTreeSet<&String> = state.revealed_clues.iter().collect();
    if unique.len() != state.revealed_clues.len() {
        return Err(InvariantViolation::new(
            "duplicate_clue",
            "revealed clues contain duplicates",
        ));
    }
    Ok(())
}

fn check_resolved_is_complete(state: &ProgressionState, case: &Case) -> Result<(), InvariantViolation> {
    if state.phase != Phase::Resolved {
        return Ok(());
    }
    if !state.mission_completed || state.mission_index != case.last_mission_index() {
        return Err(InvariantViolation::new(
            "resolved_incomplete",
            "resolved phase reached without completing the final mission",
        ));
    }
    Ok(())
}
