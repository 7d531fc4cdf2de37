//! Hand-written protobuf types for the playthrough journal and the
//! profile document.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format and never reused.

use prost::Message;

// ── Journal frame ──────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoCommandEnvelope {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(uint32, tag = "2")]
    pub schema_version: u32,
    #[prost(message, optional, tag = "3")]
    pub command: Option<ProtoCommand>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoCommand {
    #[prost(oneof = "CommandKind", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub kind: Option<CommandKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum CommandKind {
    #[prost(message, tag = "1")]
    AdvanceNarrative(Unit),
    #[prost(message, tag = "2")]
    RetreatNarrative(Unit),
    #[prost(message, tag = "3")]
    SkipToTask(Unit),
    #[prost(message, tag = "4")]
    CompleteAndAdvance(Unit),
    #[prost(message, tag = "5")]
    UpdateSource(UpdateSource),
    #[prost(message, tag = "6")]
    Evaluate(Unit),
    #[prost(message, tag = "7")]
    SelectPane(SelectPane),
    #[prost(message, tag = "8")]
    Refresh(Unit),
}

/// Payload-free command marker.
#[derive(Clone, PartialEq, Message)]
pub struct Unit {}

#[derive(Clone, PartialEq, Message)]
pub struct UpdateSource {
    #[prost(string, tag = "1")]
    pub html: String,
    #[prost(string, tag = "2")]
    pub css: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtoPane {
    Html = 0,
    Css = 1,
}

#[derive(Clone, PartialEq, Message)]
pub struct SelectPane {
    #[prost(enumeration = "ProtoPane", tag = "1")]
    pub pane: i32,
}

// ── Profile document ───────────────────────────────────────────

/// Both ledger fields travel in one document so a write is all-or-nothing.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoProfile {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(int64, tag = "2")]
    pub point_balance: i64,
    #[prost(string, repeated, tag = "3")]
    pub unlocked_ids: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoProfileBook {
    #[prost(message, repeated, tag = "1")]
    pub profiles: Vec<ProtoProfile>,
}
