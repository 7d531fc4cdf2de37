//! Proto ↔ Kernel conversion bridge.
//!
//! Converts between protobuf wire types (proto_types.rs) and the engine's
//! CommandEnvelope and LedgerState.

use codecase_engine::commands::{Command, CommandEnvelope};
use codecase_engine::domain::EditorPane;
use codecase_engine::ledger::LedgerState;

use crate::proto_types::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("frame {sequence} carries no command")]
    MissingCommand { sequence: u64 },
    #[error("frame {sequence} names unknown editor pane {value}")]
    UnknownPane { sequence: u64, value: i32 },
}

/// Convert a journal frame to the engine's envelope.
pub fn proto_to_command(proto: &ProtoCommandEnvelope) -> Result<CommandEnvelope, BridgeError> {
    let sequence = proto.sequence;
    let kind = proto
        .command
        .as_ref()
        .and_then(|c| c.kind.as_ref())
        .ok_or(BridgeError::MissingCommand { sequence })?;

    let command = match kind {
        CommandKind::AdvanceNarrative(_) => Command::AdvanceNarrative,
        CommandKind::RetreatNarrative(_) => Command::RetreatNarrative,
        CommandKind::SkipToTask(_) => Command::SkipToTask,
        CommandKind::CompleteAndAdvance(_) => Command::CompleteAndAdvance,
        CommandKind::UpdateSource(u) => Command::UpdateSource {
            html: u.html.clone(),
            css: u.css.clone(),
        },
        CommandKind::Evaluate(_) => Command::Evaluate,
        CommandKind::SelectPane(p) => {
            let pane = match ProtoPane::try_from(p.pane) {
                Ok(ProtoPane::Html) => EditorPane::Html,
                Ok(ProtoPane::Css) => EditorPane::Css,
                Err(_) => {
                    return Err(BridgeError::UnknownPane {
                        sequence,
                        value: p.pane,
                    })
                }
            };
            Command::SelectPane { pane }
        }
        CommandKind::Refresh(_) => Command::Refresh,
    };

    Ok(CommandEnvelope {
        sequence,
        schema_version: proto.schema_version,
        command,
    })
}

/// Convert the engine's envelope to a journal frame.
pub fn command_to_proto(envelope: &CommandEnvelope) -> ProtoCommandEnvelope {
    let kind = match &envelope.command {
        Command::AdvanceNarrative => CommandKind::AdvanceNarrative(Unit {}),
        Command::RetreatNarrative => CommandKind::RetreatNarrative(Unit {}),
        Command::SkipToTask => CommandKind::SkipToTask(Unit {}),
        Command::CompleteAndAdvance => CommandKind::CompleteAndAdvance(Unit {}),
        Command::UpdateSource { html, css } => CommandKind::UpdateSource(UpdateSource {
            html: html.clone(),
            css: css.clone(),
        }),
        Command::Evaluate => CommandKind::Evaluate(Unit {}),
        Command::SelectPane { pane } => CommandKind::SelectPane(SelectPane {
            pane: match pane {
                EditorPane::Html => ProtoPane::Html as i32,
                EditorPane::Css => ProtoPane::Css as i32,
            },
        }),
        Command::Refresh => CommandKind::Refresh(Unit {}),
    };

    ProtoCommandEnvelope {
        sequence: envelope.sequence,
        schema_version: envelope.schema_version,
        command: Some(ProtoCommand { kind: Some(kind) }),
    }
}

pub fn ledger_to_proto(user_id: &str, ledger: &LedgerState) -> ProtoProfile {
    ProtoProfile {
        user_id: user_id.to_string(),
        point_balance: ledger.point_balance,
        // BTreeSet iteration keeps the document byte-stable.
        unlocked_ids: ledger.unlocked_ids.iter().cloned().collect(),
    }
}

pub fn proto_to_ledger(proto: &ProtoProfile) -> LedgerState {
    LedgerState {
        point_balance: proto.point_balance,
        unlocked_ids: proto.unlocked_ids.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_pane_survives_bridge() {
        let env = CommandEnvelope::new(4, Command::SelectPane { pane: EditorPane::Css });
        let back = proto_to_command(&command_to_proto(&env)).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_missing_command_rejected() {
        let proto = ProtoCommandEnvelope {
            sequence: 7,
            schema_version: 1,
            command: None,
        };
        assert_eq!(
            proto_to_command(&proto),
            Err(BridgeError::MissingCommand { sequence: 7 })
        );
    }

    #[test]
    fn test_unknown_pane_rejected() {
        let proto = ProtoCommandEnvelope {
            sequence: 2,
            schema_version: 1,
            command: Some(ProtoCommand {
                kind: Some(CommandKind::SelectPane(SelectPane { pane: 9 })),
            }),
        };
        assert!(matches!(
            proto_to_command(&proto),
            Err(BridgeError::UnknownPane { value: 9, .. })
        ));
    }

    #[test]
    fn test_ledger_document_sorted() {
        let mut ledger = LedgerState::new(40);
        ledger.unlocked_ids.insert("zeta".into());
        ledger.unlocked_ids.insert("alpha".into());
        let proto = ledger_to_proto("u1", &ledger);
        assert_eq!(proto.unlocked_ids, vec!["alpha".to_string(), "zeta".to_string()]);
        assert_eq!(proto_to_ledger(&proto), ledger);
    }
}
