/// CodeCase Engine — Command Definitions
///
/// Commands are pure data. They carry intent and payload only and contain
/// no transition logic.
///
/// Schema version is locked at 1. Envelopes with any other version are
/// rejected by the engine.

use serde::{Deserialize, Serialize};

use crate::domain::EditorPane;

/// Schema version for v1 command envelopes.
pub const SCHEMA_VERSION: u32 = 1;

/// The playthrough command surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    AdvanceNarrative,
    RetreatNarrative,
    SkipToTask,
    CompleteAndAdvance,
    UpdateSource { html: String, css: String },
    Evaluate,
    SelectPane { pane: EditorPane },
    Refresh,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AdvanceNarrative => "advance_narrative",
            Command::RetreatNarrative => "retreat_narrative",
            Command::SkipToTask => "skip_to_task",
            Command::CompleteAndAdvance => "complete_and_advance",
            Command::UpdateSource { .. } => "update_source",
            Command::Evaluate => "evaluate",
            Command::SelectPane { .. } => "select_pane",
            Command::Refresh => "refresh",
        }
    }
}

/// Sequenced command, as stored in a playthrough journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub sequence: u64,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub command: Command,
}

impl CommandEnvelope {
    pub fn new(sequence: u64, command: Command) -> Self {
        Self {
            sequence,
            schema_version: SCHEMA_VERSION,
            command,
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Wrap commands in envelopes numbered from 1.
pub fn sequence_commands(commands: impl IntoIterator<Item = Command>) -> Vec<CommandEnvelope> {
    commands
        .into_iter()
        .enumerate()
        .map(|(i, command)| CommandEnvelope::new(i as u64 + 1, command))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_value(Command::UpdateSource {
            html: "<h1>x</h1>".into(),
            css: String::new(),
        })
        .unwrap();
        assert_eq!(json["type"], "update_source");
        assert_eq!(json["html"], "<h1>x</h1>");
    }

    #[test]
    fn test_envelope_defaults_schema_version() {
        let env: CommandEnvelope =
            serde_json::from_str(r#"{"sequence":3,"command":{"type":"evaluate"}}"#).unwrap();
        assert_eq!(env.schema_version, SCHEMA_VERSION);
        assert_eq!(env.command, Command::Evaluate);
    }

    #[test]
    fn test_sequence_commands_numbers_from_one() {
        let envs = sequence_commands(vec![Command::SkipToTask, Command::Evaluate]);
        assert_eq!(envs[0].sequence, 1);
        assert_eq!(envs[1].sequence, 2);
    }
}
