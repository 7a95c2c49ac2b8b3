//! Speech timer readings
//!
//! Pure function of elapsed seconds; the caller owns the 1-second tick.

use crate::config::{TimerConfig, TimerMode};
use crate::time::format_clock;

/// What the timer shows at a given moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerReading {
    /// `MM:SS`
    pub display: String,
    /// Seconds left (countdown only)
    pub remaining_secs: Option<u64>,
    /// Set when the remaining time hits a configured signal mark
    pub signal: Option<u64>,
    /// Countdown reached zero
    pub expired: bool,
}

#[derive(Debug, Clone)]
pub struct SpeechTimer {
    mode: TimerMode,
    limit_secs: u64,
    signals: Vec<u64>,
}

impl SpeechTimer {
    pub fn new(mode: TimerMode, limit_secs: u64, signals: Vec<u64>) -> Self {
        Self {
            mode,
            limit_secs,
            signals,
        }
    }

    pub fn from_config(config: &TimerConfig) -> Self {
        let config = config.clone().validated();
        Self::new(
            config.mode,
            config.speech_time_limit_secs.max(0) as u64,
            config.time_signals_secs.iter().map(|s| *s as u64).collect(),
        )
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn limit_secs(&self) -> u64 {
        self.limit_secs
    }

    /// Reading after `elapsed_secs` whole seconds
    pub fn reading(&self, elapsed_secs: u64) -> TimerReading {
        match self.mode {
            TimerMode::Countdown => {
                let remaining = self.limit_secs.saturating_sub(elapsed_secs);
                TimerReading {
                    display: format_clock(remaining),
                    remaining_secs: Some(remaining),
                    signal: self.signals.contains(&remaining).then_some(remaining),
                    expired: remaining == 0,
                }
            }
            TimerMode::Stopwatch => TimerReading {
                display: format_clock(elapsed_secs),
                remaining_secs: None,
                signal: None,
                expired: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countdown() -> SpeechTimer {
        SpeechTimer::new(TimerMode::Countdown, 180, vec![60, 30, 10])
    }

    #[test]
    fn test_countdown_display() {
        assert_eq!(countdown().reading(0).display, "03:00");
        assert_eq!(countdown().reading(75).display, "01:45");
    }

    #[test]
    fn test_countdown_signals_at_marks() {
        let timer = countdown();
        assert_eq!(timer.reading(120).signal, Some(60));
        assert_eq!(timer.reading(121).signal, None);
        assert_eq!(timer.reading(170).signal, Some(10));
    }

    #[test]
    fn test_countdown_expires_and_clamps() {
        let reading = countdown().reading(500);
        assert!(reading.expired);
        assert_eq!(reading.display, "00:00");
        assert_eq!(reading.remaining_secs, Some(0));
    }

    #[test]
    fn test_stopwatch_counts_up_without_signals() {
        let timer = SpeechTimer::new(TimerMode::Stopwatch, 180, vec![60]);
        let reading = timer.reading(120);
        assert_eq!(reading.display, "02:00");
        assert_eq!(reading.signal, None);
        assert!(!timer.reading(1000).expired);
    }

    #[test]
    fn test_from_config_uses_validated_values() {
        let config = TimerConfig {
            speech_time_limit_secs: 0,
            time_signals_secs: vec![5, 5, 20],
            ..TimerConfig::default()
        };
        let timer = SpeechTimer::from_config(&config);
        assert_eq!(timer.limit_secs(), 180);
        assert_eq!(timer.reading(160).signal, Some(20));
    }
}
