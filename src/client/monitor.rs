use std::fmt;

use crate::config::INITIAL_WARNINGS;

/// Signals that count against the warning budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    /// The tab or window lost foreground focus.
    VisibilityLost,
    CopyAttempted,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::VisibilityLost => f.write_str("visibility lost"),
            Violation::CopyAttempted => f.write_str("copy attempted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Budget debited; `remaining` warnings left.
    Warning { remaining: u32 },
    /// Budget exhausted by this event. Reported once per monitor.
    Terminated,
    /// Monitor is disarmed or already terminated.
    Ignored,
}

/// Warning budget for one active attempt.
///
/// Every violation kind draws from the same budget. State lives only as
/// long as the session; reopening the test starts from a full budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityMonitor {
    remaining: u32,
    armed: bool,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new(INITIAL_WARNINGS)
    }
}

impl IntegrityMonitor {
    pub fn new(budget: u32) -> Self {
        Self {
            remaining: budget,
            armed: true,
        }
    }

    /// A monitor that ignores everything (review mode).
    pub fn disarmed() -> Self {
        Self {
            remaining: INITIAL_WARNINGS,
            armed: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn record(&mut self, violation: Violation) -> MonitorVerdict {
        if !self.armed {
            return MonitorVerdict::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.armed = false;
            tracing::warn!(%violation, "Warning budget exhausted");
            return MonitorVerdict::Terminated;
        }

        tracing::warn!(%violation, remaining = self.remaining, "Integrity warning");
        MonitorVerdict::Warning {
            remaining: self.remaining,
        }
    }

    /// Stop watching; the attempt ended some other way.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_violations_share_one_budget() {
        let mut monitor = IntegrityMonitor::default();
        assert_eq!(
            monitor.record(Violation::VisibilityLost),
            MonitorVerdict::Warning { remaining: 2 }
        );
        assert_eq!(
            monitor.record(Violation::CopyAttempted),
            MonitorVerdict::Warning { remaining: 1 }
        );
        assert_eq!(
            monitor.record(Violation::VisibilityLost),
            MonitorVerdict::Terminated
        );
    }

    #[test]
    fn test_terminates_exactly_once() {
        let mut monitor = IntegrityMonitor::new(3);
        let verdicts: Vec<_> = (0..6)
            .map(|_| monitor.record(Violation::CopyAttempted))
            .collect();

        let terminations = verdicts
            .iter()
            .filter(|v| **v == MonitorVerdict::Terminated)
            .count();
        assert_eq!(terminations, 1);
        assert_eq!(verdicts[2], MonitorVerdict::Terminated);
        assert!(verdicts[3..].iter().all(|v| *v == MonitorVerdict::Ignored));
    }

    #[test]
    fn test_disarmed_monitor_ignores_events() {
        let mut monitor = IntegrityMonitor::disarmed();
        assert_eq!(
            monitor.record(Violation::VisibilityLost),
            MonitorVerdict::Ignored
        );
        assert_eq!(monitor.remaining(), INITIAL_WARNINGS);

        let mut armed = IntegrityMonitor::default();
        armed.disarm();
        assert_eq!(armed.record(Violation::CopyAttempted), MonitorVerdict::Ignored);
    }
}
