use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of "now" for services and client sessions.
///
/// `Fixed` shares its instant between clones so tests can advance the time
/// seen by every component holding the clock.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(Arc::new(Mutex::new(at)))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => match at.lock() {
                Ok(guard) => *guard,
                Err(poisoned) => *poisoned.into_inner(),
            },
        }
    }

    /// Advance a fixed clock. No effect on the system clock.
    pub fn advance(&self, delta: Duration) {
        if let Clock::Fixed(at) = self {
            match at.lock() {
                Ok(mut guard) => *guard += delta,
                Err(poisoned) => *poisoned.into_inner() += delta,
            }
        }
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances_across_clones() {
        let clock = fixed_clock();
        let other = clock.clone();
        let before = other.now();

        clock.advance(Duration::seconds(90));

        assert_eq!(other.now() - before, Duration::seconds(90));
    }
}
