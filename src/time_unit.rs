use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: u64 = 24 * NANOS_PER_HOUR;

/// Scale in which rate windows are configured and rates are reported.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Number of nanoseconds in a single unit
    pub fn nanos_per_unit(self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => NANOS_PER_MICRO,
            TimeUnit::Milliseconds => NANOS_PER_MILLI,
            TimeUnit::Seconds => NANOS_PER_SECOND,
            TimeUnit::Minutes => NANOS_PER_MINUTE,
            TimeUnit::Hours => NANOS_PER_HOUR,
            TimeUnit::Days => NANOS_PER_DAY,
        }
    }

    /// Converts `duration` given in this unit to nanoseconds.
    /// Clamps to `u64::MAX` instead of overflowing.
    pub fn to_nanos(self, duration: u64) -> u64 {
        duration.saturating_mul(self.nanos_per_unit())
    }

    /// Converts nanoseconds to this unit, truncating the remainder.
    pub fn from_nanos(self, nanos: u64) -> u64 {
        nanos / self.nanos_per_unit()
    }

    /// Short suffix used when printing rates, e.g. `/s`
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "µs",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

#[cfg(test)]
mod test {
    use super::TimeUnit;
    use rstest::rstest;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(TimeUnit::Nanoseconds, 1)]
    #[case(TimeUnit::Microseconds, 1_000)]
    #[case(TimeUnit::Milliseconds, 1_000_000)]
    #[case(TimeUnit::Seconds, 1_000_000_000)]
    #[case(TimeUnit::Minutes, 60_000_000_000)]
    #[case(TimeUnit::Hours, 3_600_000_000_000)]
    #[case(TimeUnit::Days, 86_400_000_000_000)]
    fn test_to_nanos(#[case] unit: TimeUnit, #[case] nanos: u64) {
        assert_eq!(unit.to_nanos(1), nanos);
        assert_eq!(unit.to_nanos(3), 3 * nanos);
        assert_eq!(unit.from_nanos(3 * nanos), 3);
    }

    #[test]
    fn test_to_nanos_saturates() {
        assert_eq!(TimeUnit::Days.to_nanos(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_from_nanos_truncates() {
        assert_eq!(TimeUnit::Seconds.from_nanos(1_999_999_999), 1);
        assert_eq!(TimeUnit::Minutes.from_nanos(59_000_000_000), 0);
    }

    #[test]
    fn test_parse_and_display() {
        for unit in TimeUnit::iter() {
            assert_eq!(TimeUnit::from_str(&unit.to_string()).unwrap(), unit);
        }
        assert_eq!(TimeUnit::from_str("seconds").unwrap(), TimeUnit::Seconds);
        assert!(TimeUnit::from_str("fortnights").is_err());
    }
}
