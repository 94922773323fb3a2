//! Alarm match filter.

use super::datetime::DateTime;

/// Per-field alarm match condition.
///
/// A `None` field is ignored when matching. The degenerate filter with every
/// field `None` matches on every tick, which is how a once-per-second alarm
/// interrupt is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmFilter {
    /// Match on the second value
    pub second: Option<u8>,
    /// Match on the minute value
    pub minute: Option<u8>,
    /// Match on the hour value
    pub hour: Option<u8>,
    /// Match on the day-of-month value
    pub day: Option<u8>,
    /// Match on the month value
    pub month: Option<u8>,
}

impl AlarmFilter {
    /// A filter that matches every tick.
    pub const fn every_second() -> Self {
        AlarmFilter {
            second: None,
            minute: None,
            hour: None,
            day: None,
            month: None,
        }
    }

    /// Sets the second to match on.
    pub const fn second(mut self, second: u8) -> Self {
        self.second = Some(second);
        self
    }

    /// Sets the minute to match on.
    pub const fn minute(mut self, minute: u8) -> Self {
        self.minute = Some(minute);
        self
    }

    /// Sets the hour to match on.
    pub const fn hour(mut self, hour: u8) -> Self {
        self.hour = Some(hour);
        self
    }

    /// Sets the day of month to match on.
    pub const fn day(mut self, day: u8) -> Self {
        self.day = Some(day);
        self
    }

    /// Sets the month to match on.
    pub const fn month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    /// Whether `dt` satisfies every enabled field.
    pub fn matches(&self, dt: &DateTime) -> bool {
        self.second.map_or(true, |v| v == dt.second)
            && self.minute.map_or(true, |v| v == dt.minute)
            && self.hour.map_or(true, |v| v == dt.hour)
            && self.day.map_or(true, |v| v == dt.day)
            && self.month.map_or(true, |v| v == dt.month)
    }
}

#[cfg(test)]
mod tests {
    use super::super::datetime::DayOfWeek;
    use super::*;

    fn noon() -> DateTime {
        DateTime {
            year: 2017,
            month: 3,
            day: 30,
            day_of_week: DayOfWeek::Thursday,
            hour: 12,
            minute: 0,
            second: 0,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(AlarmFilter::every_second().matches(&noon()));
    }

    #[test]
    fn enabled_fields_must_all_match() {
        let f = AlarmFilter::every_second().hour(12).second(0);
        assert!(f.matches(&noon()));

        let f = f.minute(30);
        assert!(!f.matches(&noon()));
    }
}
