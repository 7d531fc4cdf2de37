/// CodeCase Engine — Canonical Hashing
///
/// Deterministic canonical serialization + SHA-256 hashing of a
/// ProgressionState. Produces byte-identical output across platforms.
///
/// Rules:
///   - engine_version first, then the state fields in declaration order
///   - revealed_clues kept in insertion order (it is part of the state)
///   - enums as their snake_case names
///   - UTF-8 JSON, no whitespace, no float

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::ProgressionState;
use crate::ENGINE_VERSION;

/// Canonical serialization of ProgressionState to UTF-8 JSON bytes.
pub fn canonical_serialize(state: &ProgressionState) -> Vec<u8> {
    build_canonical_value(state).to_string().into_bytes()
}

/// SHA-256 of canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &ProgressionState) -> String {
    let digest = Sha256::digest(canonical_serialize(state));
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn build_canonical_value(state: &ProgressionState) -> Value {
    let mut root = Map::new();
    root.insert(
        "engine_version".to_string(),
        Value::Number((ENGINE_VERSION as u64).into()),
    );
    root.insert("case_id".to_string(), Value::String(state.case_id.clone()));
    root.insert("phase".to_string(), Value::String(state.phase.to_string()));
    root.insert(
        "beat_index".to_string(),
        Value::Number((state.beat_index as u64).into()),
    );
    root.insert(
        "mission_index".to_string(),
        Value::Number((state.mission_index as u64).into()),
    );
    root.insert("html".to_string(), Value::String(state.html.clone()));
    root.insert("css".to_string(), Value::String(state.css.clone()));
    root.insert(
        "revealed_clues".to_string(),
        Value::Array(
            state
                .revealed_clues
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ),
    );
    root.insert(
        "mission_completed".to_string(),
        Value::Bool(state.mission_completed),
    );
    root.insert("pending_reset".to_string(), Value::Bool(state.pending_reset));
    root.insert(
        "active_pane".to_string(),
        Value::String(state.active_pane.to_string()),
    );
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casebook::missing_headline;
    use crate::state::create_initial_state;

    #[test]
    fn test_serialization_has_fixed_prefix() {
        let state = create_initial_state(&missing_headline());
        let json = String::from_utf8(canonical_serialize(&state)).unwrap();
        assert!(json.starts_with(r#"{"engine_version":1,"case_id":"missing-headline","phase":"narrative""#));
        assert!(!json.contains(' '));
    }

    #[test]
    fn test_hash_is_hex_and_stable() {
        let state = create_initial_state(&missing_headline());
        let a = canonical_hash(&state);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(a, canonical_hash(&state.clone()));
    }

    #[test]
    fn test_clue_order_changes_hash() {
        let mut a = create_initial_state(&missing_headline());
        a.revealed_clues = vec!["x".into(), "y".into()];
        let mut b = a.clone();
        b.revealed_clues.reverse();
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
    }
}
