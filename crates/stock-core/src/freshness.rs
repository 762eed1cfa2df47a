use time::OffsetDateTime;

const DEFAULT_MINUTE_STEP: u8 = 5;
const DEFAULT_MAX_SECOND: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicyError {
    /// `minute_step` must be within `1..=60`.
    InvalidMinuteStep,
    /// `max_second` must be within `0..=59`.
    InvalidMaxSecond,
}

/// Recognizes timestamps emitted right after a provider's batch refresh.
///
/// A timestamp is fresh-rounded when its UTC minute is a multiple of
/// `minute_step` and its second is at most `max_second`. Every real-world
/// UTC offset is a multiple of fifteen minutes, so evaluating in UTC gives
/// the same answer as local wall-clock time for the default step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    enabled: bool,
    minute_step: u8,
    max_second: u8,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            minute_step: DEFAULT_MINUTE_STEP,
            max_second: DEFAULT_MAX_SECOND,
        }
    }
}

impl FreshnessPolicy {
    pub fn new(minute_step: u8, max_second: u8) -> Result<Self, FreshnessPolicyError> {
        if !(1..=60).contains(&minute_step) {
            return Err(FreshnessPolicyError::InvalidMinuteStep);
        }
        if max_second > 59 {
            return Err(FreshnessPolicyError::InvalidMaxSecond);
        }

        Ok(Self {
            enabled: true,
            minute_step,
            max_second,
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn minute_step(&self) -> u8 {
        self.minute_step
    }

    pub fn max_second(&self) -> u8 {
        self.max_second
    }

    pub fn is_fresh_rounded(&self, reported_at_ms: u64) -> bool {
        if !self.enabled {
            return false;
        }

        let nanos = i128::from(reported_at_ms) * 1_000_000;
        let Ok(at) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
            return false;
        };

        at.minute() % self.minute_step == 0 && at.second() <= self.max_second
    }
}
