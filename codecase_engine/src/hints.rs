/// CodeCase Engine — Hint Resolver
///
/// Stateless: (mission, html, css) → one HintRecord.
///
/// Each mission carries a fixed priority list of failure signatures, authored
/// separately from the validator's conditions and often finer grained
/// (a signature per deprecated tag rather than one "no deprecated tags").
/// The first detected failure wins; no detected failure yields the
/// mission's completion hint. A mission without signatures gets its first
/// authored fallback hint, or the generic encouragement when it has none.

use std::collections::BTreeMap;

use crate::domain::{HintRecord, Mission};

/// `fn(html_lower, css_lower) -> failure present`.
pub type FailureCheck = fn(&str, &str) -> bool;

pub const ENCOURAGEMENT_HINT_ID: &str = "keep-going";
pub const ENCOURAGEMENT_MESSAGE: &str =
    "Keep investigating. Compare the page against the mission objective.";

#[derive(Clone)]
pub struct HintSignature {
    pub id: String,
    pub message: String,
    pub error_message: Option<String>,
    pub detect: FailureCheck,
}

impl HintSignature {
    pub fn new(id: &str, message: &str, detect: FailureCheck) -> Self {
        Self {
            id: id.to_string(),
            message: message.to_string(),
            error_message: None,
            detect,
        }
    }

    pub fn with_error(mut self, error_message: &str) -> Self {
        self.error_message = Some(error_message.to_string());
        self
    }
}

impl std::fmt::Debug for HintSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HintSignature")
            .field("id", &self.id)
            .field("message", &self.message)
            .field("error_message", &self.error_message)
            .finish_non_exhaustive()
    }
}

/// Priority-ordered signatures plus the message shown once all are clear.
#[derive(Debug, Clone)]
pub struct MissionHints {
    pub signatures: Vec<HintSignature>,
    pub completion_message: String,
}

#[derive(Debug, Clone)]
pub struct HintResolver {
    missions: BTreeMap<String, MissionHints>,
    encouragement: String,
}

impl Default for HintResolver {
    fn default() -> Self {
        Self {
            missions: BTreeMap::new(),
            encouragement: ENCOURAGEMENT_MESSAGE.to_string(),
        }
    }
}

impl HintResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mission_id: impl Into<String>, hints: MissionHints) {
        self.missions.insert(mission_id.into(), hints);
    }

    pub fn with_encouragement(mut self, message: impl Into<String>) -> Self {
        self.encouragement = message.into();
        self
    }

    pub fn knows(&self, mission_id: &str) -> bool {
        self.missions.contains_key(mission_id)
    }

    pub fn resolve(&self, mission: &Mission, html: &str, css: &str) -> HintRecord {
        let mission_id = mission.id.as_str();
        let table = match self.missions.get(mission_id) {
            Some(table) if !table.signatures.is_empty() => table,
            _ => return self.fallback_hint(mission),
        };

        let html = html.to_lowercase();
        let css = css.to_lowercase();

        for signature in &table.signatures {
            if (signature.detect)(&html, &css) {
                return HintRecord {
                    id: signature.id.clone(),
                    message: signature.message.clone(),
                    is_resolved: false,
                    error_message: signature.error_message.clone(),
                };
            }
        }

        HintRecord {
            id: format!("{}:solved", mission_id),
            message: table.completion_message.clone(),
            is_resolved: true,
            error_message: None,
        }
    }

    fn fallback_hint(&self, mission: &Mission) -> HintRecord {
        let (id, message) = match mission.hints.first() {
            Some(hint) => (format!("{}:fallback", mission.id), hint.clone()),
            None => (ENCOURAGEMENT_HINT_ID.to_string(), self.encouragement.clone()),
        };
        HintRecord {
            id,
            message,
            is_resolved: false,
            error_message: None,
        }
    }
}
