#![forbid(unsafe_code)]

/// Engine v1. Changes to transition behaviour or hashing bump this.
pub const ENGINE_VERSION: u32 = 1;

pub mod arithmetic;
pub mod domain;
pub mod commands;
pub mod rules;
pub mod validator;
pub mod stability;
pub mod hints;
pub mod casebook;
pub mod state;
pub mod transitions;
pub mod invariants;
pub mod ledger;
pub mod hashing;
pub mod engine;
