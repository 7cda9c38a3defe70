/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Seconds still on the clock after this tick.
    Remaining(u64),
    /// The clock just reached zero. Reported once.
    Expired,
    /// Cancelled or already expired; nothing to do.
    Stopped,
}

/// Countdown for one active attempt, ticked once per second by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
    running: bool,
}

impl Countdown {
    pub fn new(remaining_secs: u64) -> Self {
        Self {
            remaining: remaining_secs,
            running: true,
        }
    }

    /// A countdown that never fires (review mode).
    pub fn stopped() -> Self {
        Self {
            remaining: 0,
            running: false,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&mut self) -> TimerTick {
        if !self.running {
            return TimerTick::Stopped;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            return TimerTick::Expired;
        }
        TimerTick::Remaining(self.remaining)
    }

    pub fn cancel(&mut self) {
        self.running = false;
    }
}
