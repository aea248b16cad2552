//! Orchestrator state machine
//!
//! `Idle -> LockAcquiring -> Locked -> SessionOpen -> Diffing ->
//! (Transferring) -> Committing -> Released -> Done`, with `Aborting`
//! reachable from every state after `Locked`.

use std::fmt;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Idle,
    LockAcquiring,
    Locked,
    SessionOpen,
    Diffing,
    Transferring,
    Committing,
    Aborting,
    Released,
    Done,
}

impl DeployState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployState::Idle => "idle",
            DeployState::LockAcquiring => "lock_acquiring",
            DeployState::Locked => "locked",
            DeployState::SessionOpen => "session_open",
            DeployState::Diffing => "diffing",
            DeployState::Transferring => "transferring",
            DeployState::Committing => "committing",
            DeployState::Aborting => "aborting",
            DeployState::Released => "released",
            DeployState::Done => "done",
        }
    }

    /// Whether the lock is held in this state
    pub fn holds_lock(self) -> bool {
        !matches!(
            self,
            DeployState::Idle
                | DeployState::LockAcquiring
                | DeployState::Released
                | DeployState::Done
        )
    }

    fn can_enter(self, next: DeployState) -> bool {
        use DeployState::*;
        match (self, next) {
            (Idle, LockAcquiring) => true,
            // acquisition failed: nothing to release
            (LockAcquiring, Locked | Done) => true,
            (Locked, SessionOpen) => true,
            (SessionOpen, Diffing) => true,
            (Diffing, Transferring | Committing) => true,
            (Transferring, Committing) => true,
            (Committing, Released) => true,
            (Aborting, Released) => true,
            (Released, Done) => true,
            (from, Aborting) => from.holds_lock() && from != Aborting,
            _ => false,
        }
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the states one deployment passes through
#[derive(Debug, Clone)]
pub struct StateTracker {
    history: Vec<DeployState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: vec![DeployState::Idle],
        }
    }

    pub fn current(&self) -> DeployState {
        self.history
            .last()
            .copied()
            .unwrap_or(DeployState::Idle)
    }

    pub fn advance(&mut self, next: DeployState) {
        let current = self.current();
        if current == next {
            return;
        }
        if current.can_enter(next) {
            debug!(from = %current, to = %next, "deploy state");
        } else {
            warn!(from = %current, to = %next, "unexpected deploy state transition");
        }
        self.history.push(next);
    }

    pub fn history(&self) -> &[DeployState] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeployState::*;

    #[test]
    fn queued_success_path_is_legal() {
        let path = [
            LockAcquiring,
            Locked,
            SessionOpen,
            Diffing,
            Transferring,
            Committing,
            Released,
            Done,
        ];
        let mut from = Idle;
        for next in path {
            assert!(from.can_enter(next), "{} -> {}", from, next);
            from = next;
        }
    }

    #[test]
    fn aborting_only_while_locked() {
        assert!(!Idle.can_enter(Aborting));
        assert!(!LockAcquiring.can_enter(Aborting));
        assert!(Locked.can_enter(Aborting));
        assert!(Committing.can_enter(Aborting));
        assert!(!Aborting.can_enter(Aborting));
        assert!(Aborting.can_enter(Released));
        assert!(!Aborting.can_enter(Done));
    }

    #[test]
    fn tracker_records_history_without_repeats() {
        let mut tracker = StateTracker::new();
        tracker.advance(LockAcquiring);
        tracker.advance(LockAcquiring);
        tracker.advance(Done);
        assert_eq!(tracker.history(), &[Idle, LockAcquiring, Done]);
        assert_eq!(tracker.current(), Done);
    }
}
