//! Progress reporting for long-running backend operations

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Which stage of an operation a progress update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Network fetch (objects received)
    Transfer,
    /// Working tree materialization (files written)
    Checkout,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Transfer => f.write_str("transfer"),
            Phase::Checkout => f.write_str("checkout"),
        }
    }
}

/// A single progress update
///
/// Counters come straight from the backend and may repeat between updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completion as an integer percentage, 0 when the total is unknown
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed.min(self.total) as u128 * 100) / self.total as u128) as u32
    }
}

/// Sink for progress updates
///
/// Called on whichever thread runs the task body.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: Progress);
}

impl<F> ProgressReporter for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

/// Reporter that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _progress: Progress) {}
}

/// Reporter that logs percentages at debug level
///
/// Only logs when the integer percentage of a phase changes.
#[derive(Debug)]
pub struct TracingProgress {
    transfer: AtomicU32,
    checkout: AtomicU32,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self {
            transfer: AtomicU32::new(u32::MAX),
            checkout: AtomicU32::new(u32::MAX),
        }
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TracingProgress {
    fn report(&self, progress: Progress) {
        let last = match progress.phase {
            Phase::Transfer => &self.transfer,
            Phase::Checkout => &self.checkout,
        };
        let percent = progress.percent();
        if last.swap(percent, Ordering::Relaxed) != percent {
            tracing::debug!(
                phase = %progress.phase,
                completed = progress.completed,
                total = progress.total,
                "{}_progress: {}%",
                progress.phase,
                percent
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_percent() {
        let p = Progress {
            phase: Phase::Transfer,
            completed: 50,
            total: 200,
        };
        assert_eq!(p.percent(), 25);
    }

    #[test]
    fn test_percent_unknown_total() {
        let p = Progress {
            phase: Phase::Checkout,
            completed: 3,
            total: 0,
        };
        assert_eq!(p.percent(), 0);
    }

    #[test]
    fn test_percent_clamped() {
        let p = Progress {
            phase: Phase::Checkout,
            completed: 12,
            total: 10,
        };
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |p: Progress| seen.lock().unwrap().push(p.completed);
        reporter.report(Progress {
            phase: Phase::Transfer,
            completed: 1,
            total: 2,
        });
        reporter.report(Progress {
            phase: Phase::Transfer,
            completed: 1,
            total: 2,
        });
        assert_eq!(*seen.lock().unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Transfer.to_string(), "transfer");
        assert_eq!(Phase::Checkout.to_string(), "checkout");
    }
}
