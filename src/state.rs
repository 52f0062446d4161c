//! Run state of a scheduler.
//!
//! The state is a single atomic byte so that `start` and `stop` can claim their
//! transition with a compare-and-set and never run twice concurrently.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum RunStatus {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl RunStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunStatus::Running,
            2 => RunStatus::Stopped,
            _ => RunStatus::NotStarted,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::NotStarted => "not started",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct RunState(AtomicU8);

impl Default for RunState {
    fn default() -> Self {
        Self(AtomicU8::new(RunStatus::NotStarted as u8))
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn get(&self) -> RunStatus {
        RunStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.get() == RunStatus::Running
    }

    /// Moves to `Running` from `NotStarted` or `Stopped`. Fails if already running.
    pub fn begin(&self) -> bool {
        [RunStatus::NotStarted, RunStatus::Stopped]
            .into_iter()
            .any(|from| self.transition(from, RunStatus::Running))
    }

    /// Moves from `Running` to `Stopped`.
    pub fn finish(&self) -> bool {
        self.transition(RunStatus::Running, RunStatus::Stopped)
    }

    fn transition(&self, from: RunStatus, to: RunStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        let state = RunState::new();
        assert_eq!(state.get(), RunStatus::NotStarted);
        assert!(!state.finish());
        assert!(state.begin());
        assert!(!state.begin());
        assert!(state.is_running());
        assert!(state.finish());
        assert!(!state.finish());
        assert_eq!(state.get(), RunStatus::Stopped);
        assert!(state.begin());
    }
}
