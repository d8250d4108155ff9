//! Monotonic clocks.
//!
//! Everything time-related in the crate (task deadlines, boot timestamps,
//! merge durations) is measured as a [`Duration`] since an origin, normally
//! boot. The clock is injected so that tests can drive time by hand.

use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A source of monotonic time.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall-clock monotonic time backed by [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose origin is the current instant.
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }

    /// Creates a clock that reports `offset` plus the time elapsed from now.
    ///
    /// Used to seed the clock with the time the system has already been up.
    pub fn with_offset(offset: Duration) -> Self {
        let now = Instant::now();
        MonotonicClock {
            origin: now.checked_sub(offset).unwrap_or(now),
        }
    }

    /// Creates a clock whose origin is the system's boot, as reported by
    /// `/proc/uptime`.
    ///
    /// # Errors
    ///
    /// Returns an error if the uptime cannot be read or parsed.
    pub fn since_boot() -> io::Result<Self> {
        let uptime = std::fs::read_to_string(UPTIME_PATH)?;
        let offset = parse_uptime(&uptime).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("malformed uptime: {uptime:?}"))
        })?;
        Ok(Self::with_offset(offset))
    }
}

const UPTIME_PATH: &str = "/proc/uptime";

/// Parses the first field of `/proc/uptime`, the seconds since boot.
fn parse_uptime(contents: &str) -> Option<Duration> {
    let secs: f64 = contents.split_whitespace().next()?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Monotonic time backed by tokio's clock.
///
/// Follows tokio's paused time in tests, so timer-driven loops can be run
/// without real sleeps.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        TokioClock {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Duration::from_secs(10));
        clock.advance(Duration::from_millis(1500));

        assert_eq!(clock.now(), Duration::from_millis(11_500));
    }

    #[test]
    fn monotonic_clock_includes_offset() {
        let clock = MonotonicClock::with_offset(Duration::from_secs(30));
        assert!(clock.now() >= Duration::from_secs(30));
    }

    #[test]
    fn uptime_is_parsed_from_first_field() {
        assert_eq!(
            parse_uptime("350735.25 234388.90\n"),
            Some(Duration::from_millis(350_735_250))
        );
        assert_eq!(parse_uptime("12 3"), Some(Duration::from_secs(12)));
    }

    #[test]
    fn malformed_uptime_is_rejected() {
        assert_eq!(parse_uptime(""), None);
        assert_eq!(parse_uptime("soon 1.0"), None);
        assert_eq!(parse_uptime("-4.0 1.0"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(clock.now(), Duration::from_secs(3));
    }
}
