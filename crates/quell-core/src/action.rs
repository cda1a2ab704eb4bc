//! Outcome of processing one notification.

/// What the gateway decided to do with an accepted request.
///
/// `SuppressDedup` is reserved for payload-level deduplication performed ahead
/// of the edge logic; the edge/flap engine itself never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Accepted but nothing to forward (stable value, lost race, or demoted).
    NoOp,
    /// Flip observed but held back by the flapping controls.
    SuppressFlapping,
    /// Identical payload already accepted recently.
    SuppressDedup,
    /// The tracked value changed and the original payload goes out.
    EdgeTriggeredForward,
    /// No edge logic applied; the original payload goes out unchanged.
    ForwardedAsIs,
    /// A synthetic aggregate of recent flips goes out instead of the original.
    AggregateSent,
}

impl Action {
    /// Wire status string reported back to the submitter.
    pub fn status_text(self) -> &'static str {
        match self {
            Action::NoOp => "no_op",
            Action::SuppressFlapping => "suppress_flap",
            Action::SuppressDedup => "suppress_dedup",
            Action::EdgeTriggeredForward => "edge_triggered_forward",
            Action::ForwardedAsIs => "forwarded_as_is",
            Action::AggregateSent => "aggregate_sent",
        }
    }

    /// Actions that consume the per-target rate budget.
    pub fn counts_against_target(self) -> bool {
        matches!(self, Action::EdgeTriggeredForward | Action::AggregateSent)
    }
}
