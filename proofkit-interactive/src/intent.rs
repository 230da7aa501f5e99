//! Intent lifecycle.
//!
//! One intent is one outstanding exchange:
//! `Created -> CodeIssued -> Delivered -> Resolved`, with `Cancelled` and
//! `TimedOut` terminal at any point. Re-issuing the code is idempotent and
//! a terminal state never regresses.

/// How a response reached this device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryPath {
    /// Pushed over an authenticated live connection.
    LiveChannel,
    /// Imported by hand from a file or the clipboard.
    ManualImport,
}

/// Lifecycle state of one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentState {
    /// Request minted and registered; handle pending.
    Created,
    /// The scannable code has been rendered at least once.
    CodeIssued,
    /// A response arrived and passed the accept path.
    Delivered(DeliveryPath),
    /// The awaiting caller has its response.
    Resolved,
    /// Caller-initiated cancellation.
    Cancelled,
    /// The configured timeout elapsed first.
    TimedOut,
}

impl IntentState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentState::Resolved | IntentState::Cancelled | IntentState::TimedOut
        )
    }

    fn rank(&self) -> u8 {
        match self {
            IntentState::Created => 0,
            IntentState::CodeIssued => 1,
            IntentState::Delivered(_) => 2,
            IntentState::Resolved | IntentState::Cancelled | IntentState::TimedOut => 3,
        }
    }

    /// The single transition point: move forward to `next` or stay put.
    /// Terminal states absorb everything; earlier states never come back.
    #[must_use]
    pub fn advance(self, next: IntentState) -> IntentState {
        if self.is_terminal() {
            return self;
        }
        if next.rank() > self.rank() {
            next
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_progress() {
        let state = IntentState::Created;
        let state = state.advance(IntentState::CodeIssued);
        assert_eq!(state, IntentState::CodeIssued);

        let state = state.advance(IntentState::Delivered(DeliveryPath::LiveChannel));
        assert_eq!(state, IntentState::Delivered(DeliveryPath::LiveChannel));

        let state = state.advance(IntentState::Resolved);
        assert_eq!(state, IntentState::Resolved);
    }

    #[test]
    fn test_code_issuing_is_idempotent() {
        let state = IntentState::CodeIssued;
        assert_eq!(state.advance(IntentState::CodeIssued), IntentState::CodeIssued);
        // A delivered exchange does not regress when the code is re-rendered.
        let state = IntentState::Delivered(DeliveryPath::ManualImport);
        assert_eq!(state.advance(IntentState::CodeIssued), state);
    }

    #[test]
    fn test_terminal_states_absorb() {
        for terminal in [
            IntentState::Resolved,
            IntentState::Cancelled,
            IntentState::TimedOut,
        ] {
            assert!(terminal.is_terminal());
            assert_eq!(terminal.advance(IntentState::Created), terminal);
            assert_eq!(
                terminal.advance(IntentState::Delivered(DeliveryPath::LiveChannel)),
                terminal
            );
            assert_eq!(terminal.advance(IntentState::Cancelled), terminal);
        }
    }

    #[test]
    fn test_cancel_beats_pending_states() {
        let state = IntentState::CodeIssued.advance(IntentState::Cancelled);
        assert_eq!(state, IntentState::Cancelled);
    }
}
