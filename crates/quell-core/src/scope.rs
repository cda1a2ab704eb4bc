//! Scope-key fingerprints.
use crate::state::EdgeState;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Short stable fingerprint of a trigger expression, used as the edge-state
/// scope key. 32-bit FNV-1a rendered as `e<decimal>`; collisions across
/// distinct expressions of one tenant merge their edge scopes, which is
/// acceptable at this key space.
pub fn fingerprint(expr: &str) -> String {
    let mut hash = FNV_OFFSET;
    for byte in expr.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("e{hash}")
}

/// Convenience for stamping a fresh state with its scope key.
pub fn new_state(scope_key: &str, value: &str, now: i64) -> EdgeState {
    EdgeState {
        scope_key: scope_key.to_string(),
        last_value: value.to_string(),
        last_change_ts: now,
        window_start: now,
        flip_count: 0,
        recent: Vec::new(),
        agg_until_ts: 0,
    }
}
