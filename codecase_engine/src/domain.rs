/// CodeCase Engine — Core Domain Types
///
/// Pure data. No behaviour beyond small accessors.
/// Case and Mission are immutable content; ProgressionState is the only
/// mutable record and is owned by the playthrough engine.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Content ────────────────────────────────────────────────────────

/// One narrative beat shown before the task phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NarrativeBeat {
    pub id: String,
    pub title: String,
    pub dialogue: String,
    pub speaker: String,
    #[serde(default)]
    pub background: String,
}

/// A single gated task: broken source, success conditions, reward clue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub objective: String,
    pub initial_html: String,
    pub initial_css: String,
    pub conditions: Vec<String>, // evaluation order drives hint/progress order
    pub clue: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Difficulty tier of a case. Drives the unlock multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn multiplier(self) -> i64 {
        match self {
            Difficulty::Beginner => 2,
            Difficulty::Intermediate => 3,
            Difficulty::Advanced => 4,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

/// An ordered storyline: narrative beats, then missions, then resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Case {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub reward_points: i64, // base points for unlock pricing
    #[serde(default)]
    pub beats: Vec<NarrativeBeat>,
    pub missions: Vec<Mission>,
    pub resolution: String,
}

impl Case {
    pub fn mission(&self, index: usize) -> Option<&Mission> {
        self.missions.get(index)
    }

    pub fn mission_by_id(&self, id: &str) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id == id)
    }

    pub fn last_mission_index(&self) -> usize {
        self.missions.len().saturating_sub(1)
    }
}

// ── Playthrough state ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Narrative,
    Task,
    Resolved,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Narrative => write!(f, "narrative"),
            Phase::Task => write!(f, "task"),
            Phase::Resolved => write!(f, "resolved"),
        }
    }
}

/// Which editor the learner is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorPane {
    #[default]
    Html,
    Css,
}

impl fmt::Display for EditorPane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorPane::Html => write!(f, "html"),
            EditorPane::Css => write!(f, "css"),
        }
    }
}

/// Mutable state of one playthrough.
///
/// `html`/`css` are reinitialised from mission defaults only while
/// `pending_reset` is set, i.e. on first entry or a mission-index change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressionState {
    pub case_id: String,
    pub phase: Phase,
    pub beat_index: usize,
    pub mission_index: usize,
    pub html: String,
    pub css: String,
    pub revealed_clues: Vec<String>, // insertion order, no duplicates
    pub mission_completed: bool,
    pub pending_reset: bool,
    pub active_pane: EditorPane,
}

impl ProgressionState {
    /// Append a clue unless it is already revealed. Returns true if appended.
    pub fn reveal_clue(&mut self, clue: &str) -> bool {
        if self.revealed_clues.iter().any(|c| c == clue) {
            return false;
        }
        self.revealed_clues.push(clue.to_string());
        true
    }
}

// ── Derived values ─────────────────────────────────────────────────

/// Outcome of evaluating one mission's conditions. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub satisfied: Vec<String>,
    pub unsatisfied: Vec<String>,
    pub score: u8, // 0..=100
    pub is_completed: bool,
}

impl ValidationVerdict {
    /// Verdict for text that has not been evaluated yet: nothing satisfied.
    pub fn pending(conditions: &[String]) -> Self {
        Self {
            satisfied: Vec::new(),
            unsatisfied: conditions.to_vec(),
            score: 0,
            is_completed: false,
        }
    }

    /// Same verdict, but never reporting completion.
    pub fn forced_incomplete(&self) -> Self {
        Self {
            is_completed: false,
            ..self.clone()
        }
    }

    pub fn total(&self) -> usize {
        self.satisfied.len() + self.unsatisfied.len()
    }
}

/// Single hint shown in the hint panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintRecord {
    pub id: String,
    pub message: String,
    pub is_resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Structured, immutable outcome of one applied command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub command: String,
    pub phase_before: Option<Phase>,
    pub phase_after: Option<Phase>,
    pub mission_advanced: bool,
    pub text_reset: bool,
    pub evaluated: bool,
    pub evaluation_skipped: Option<String>, // instability reason
    pub mission_completed: bool,
    pub clue_revealed: Option<String>,
    pub verdict: Option<ValidationVerdict>,
}

impl Transition {
    pub fn phase_changed(&self) -> bool {
        self.phase_before != self.phase_after
    }
}
