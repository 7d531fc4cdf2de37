#![forbid(unsafe_code)]

//! CodeCase runtime.
//!
//! Hosts the engine kernel: async playthrough sessions with a quiescence
//! timer, the unlock gate over a profile store, the command journal and
//! replay, content loading and configuration.
//!
//! No progression logic lives here; transitions, validation and invariants
//! are delegated to the kernel.

pub mod proto_types;
pub mod proto_bridge;
pub mod journal;
pub mod replay;
pub mod session;
pub mod playthrough;
pub mod store;
pub mod unlock;
pub mod content;
pub mod config;
pub mod error;
pub mod logging;
