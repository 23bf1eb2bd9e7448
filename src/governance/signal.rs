//! Cancellation flag and wait-loop parameters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared cancellation flag, checked by every interruptible wait.
///
/// Clones share one flag. Setting it never touches persisted state.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why an interruptible wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full interval passed (pauses extend it).
    Elapsed,
    /// An IMMEDIATE signal was consumed by this waiter.
    Immediate,
    /// The stop flag was set.
    Stopped,
}

/// Timing knobs for [`GovernanceManager::wait_interval`](super::GovernanceManager::wait_interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Longest single sleep while the signal is NORMAL.
    pub slice: Duration,
    /// Sleep between signal checks while paused.
    pub pause_poll: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(100),
            pause_poll: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared_between_clones() {
        let flag = StopFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_stopped());
        flag.stop();
        assert!(observer.is_stopped());
    }
}
