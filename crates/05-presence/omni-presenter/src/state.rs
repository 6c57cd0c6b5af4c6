//! The seven-state presenter state machine shared by every presenter kind.

/// The seven states every presenter moves through, in order, with `Done`
/// terminal (a presenter is unregistered on reaching it, never revisited).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TickleState {
    /// Entered at construction; left when `start()` is called.
    Idle = 0,
    /// Entered once `start()` is accepted; left once the first chunk headers are seen.
    Ready = 1,
    /// Entered once `Ready` completes; left once the decoder is initialized.
    Starting = 2,
    /// Entered once `Starting` completes; left once `EndOfStream` is seen.
    Streaming = 3,
    /// Entered on `EndOfStream`; left once the loop count is exhausted or no rewind remains.
    Repeating = 4,
    /// Entered once looping is exhausted; left once the hold period elapses.
    Freezing = 5,
    /// Terminal: entered once freezing is over, or `end_action()` is called directly.
    Done = 6,
}

/// Current state plus a bitset of every state this presenter has ever passed
/// through, so `has_passed` is O(1) rather than a history scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresenterState {
    state: TickleState,
    history: u8,
}

impl PresenterState {
    /// A freshly constructed state machine, in `Idle` with empty history.
    pub fn new() -> PresenterState {
        PresenterState {
            state: TickleState::Idle,
            history: 0,
        }
    }

    /// The current state.
    pub fn current(&self) -> TickleState {
        self.state
    }

    /// Moves to `next`, recording the outgoing state in the history bitset.
    pub fn advance(&mut self, next: TickleState) {
        self.history |= 1 << (self.state as u8);
        self.state = next;
    }

    /// Resets to `Idle` and clears history, as happens on `start()`.
    pub fn reset(&mut self) {
        self.state = TickleState::Idle;
        self.history = 0;
    }

    /// Whether `s` is the current state or was passed through previously.
    pub fn has_passed(&self, s: TickleState) -> bool {
        self.state == s || (self.history & (1 << (s as u8))) != 0
    }
}

impl Default for PresenterState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_is_monotonic_and_recorded_in_history() {
        let mut s = PresenterState::new();
        assert_eq!(s.current(), TickleState::Idle);
        s.advance(TickleState::Ready);
        s.advance(TickleState::Starting);
        assert_eq!(s.current(), TickleState::Starting);
        assert!(s.has_passed(TickleState::Idle));
        assert!(s.has_passed(TickleState::Ready));
        assert!(s.has_passed(TickleState::Starting));
        assert!(!s.has_passed(TickleState::Streaming));
    }

    #[test]
    fn reset_clears_history() {
        let mut s = PresenterState::new();
        s.advance(TickleState::Ready);
        s.advance(TickleState::Starting);
        s.reset();
        assert_eq!(s.current(), TickleState::Idle);
        assert!(!s.has_passed(TickleState::Ready));
    }
}
