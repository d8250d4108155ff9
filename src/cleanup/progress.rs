//! Merge progress tracking.

/// Tracks merge progress reported in percent.
///
/// The last logged value only ever grows, so a log line is written once per
/// whole percent gained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeProgress {
    last_logged: u32,
}

impl MergeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last whole percentage that was logged.
    pub fn last_logged(&self) -> u32 {
        self.last_logged
    }

    /// Converts a percentage in `[0, 100]` into a fraction in `[0, 1]`.
    pub fn fraction(percentage: f64) -> f64 {
        if percentage.is_nan() {
            return 0.0;
        }
        (percentage / 100.0).clamp(0.0, 1.0)
    }

    /// Records `percentage` and returns the whole percentage to log, if it
    /// strictly exceeds the last logged one.
    pub fn record(&mut self, percentage: f64) -> Option<u32> {
        // `as` saturates and maps NaN to 0.
        let whole = percentage as u32;
        if whole > self.last_logged {
            self.last_logged = whole;
            Some(whole)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn logs_once_per_whole_percent() {
        let mut progress = MergeProgress::new();

        assert_eq!(progress.record(10.2), Some(10));
        assert_eq!(progress.record(10.9), None);
        assert_eq!(progress.record(11.4), Some(11));
        assert_eq!(progress.last_logged(), 11);
    }

    #[test]
    fn decreasing_progress_is_not_logged() {
        let mut progress = MergeProgress::new();
        progress.record(50.0);

        assert_eq!(progress.record(20.0), None);
        assert_eq!(progress.last_logged(), 50);
    }

    #[test]
    fn zero_progress_is_never_logged() {
        let mut progress = MergeProgress::new();
        assert_eq!(progress.record(0.0), None);
        assert_eq!(progress.record(0.99), None);
    }

    #[test]
    fn fraction_rescales_percent() {
        assert_eq!(MergeProgress::fraction(0.0), 0.0);
        assert_eq!(MergeProgress::fraction(50.0), 0.5);
        assert_eq!(MergeProgress::fraction(100.0), 1.0);
        assert_eq!(MergeProgress::fraction(f64::NAN), 0.0);
        assert_eq!(MergeProgress::fraction(250.0), 1.0);
    }

    proptest! {
        #[test]
        fn fraction_stays_in_unit_interval(percentage in 0.0f64..=100.0) {
            let fraction = MergeProgress::fraction(percentage);

            prop_assert!((0.0..=1.0).contains(&fraction));
            prop_assert!((fraction * 100.0 - percentage).abs() < 1e-9);
        }

        #[test]
        fn logged_values_strictly_increase(inputs in prop::collection::vec(0.0f64..=100.0, 0..50)) {
            let mut progress = MergeProgress::new();
            let mut logged = Vec::new();
            for p in inputs {
                if let Some(v) = progress.record(p) {
                    logged.push(v);
                }
            }

            prop_assert!(logged.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
