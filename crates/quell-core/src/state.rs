//! Persisted edge/flap state.
use serde::{Deserialize, Serialize};

/// Hard cap on retained flips, independent of any tenant configuration.
pub const RECENT_HARD_LIMIT: usize = 128;

/// Edge-detection state for one (tenant, scope) pair.
///
/// Records are owned by the store's compare-and-set protocol: the engine
/// loads a copy, mutates it, and writes it back conditioned on the version
/// it read. The version itself is managed by the store and travels beside
/// the state, not inside it.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EdgeState {
    /// Fingerprint of the trigger expression; immutable after creation.
    pub scope_key: String,
    /// Most recently observed coerced value.
    pub last_value: String,
    /// When the last flip happened (unix seconds).
    pub last_change_ts: i64,
    /// Start of the current flap-counting window (unix seconds).
    pub window_start: i64,
    /// Flips observed inside the current window.
    pub flip_count: u32,
    /// Recent flips, newest last, capped at [`RECENT_HARD_LIMIT`]. Only used
    /// to build aggregate payloads.
    #[serde(default)]
    pub recent: Vec<Flip>,
    /// No aggregate may be emitted before this time (cooldown).
    #[serde(default)]
    pub agg_until_ts: i64,
}

/// One recorded edge event.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Flip {
    pub at: i64,
    pub from: String,
    pub to: String,
    /// Compressed, base64url-encoded originating payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
}

impl EdgeState {
    /// Appends a flip, dropping the oldest entries past the hard cap.
    pub fn push_recent(&mut self, flip: Flip) {
        self.recent.push(flip);
        if self.recent.len() > RECENT_HARD_LIMIT {
            let excess = self.recent.len() - RECENT_HARD_LIMIT;
            self.recent.drain(..excess);
        }
    }
}
