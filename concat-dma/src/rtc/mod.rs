//! Real time clock model.
//!
//! An [`Rtc`] is configured with an initial [`DateTime`] and an
//! [`AlarmFilter`]; [`Rtc::tick_second`] advances the clock by one second and
//! reports whether the alarm interrupt fired. With the default
//! every-tick filter this is the classic once-per-second alarm used to
//! refresh a timestamp string.
//!
//! # Notes
//!
//! Calendar behavior follows the hardware, not civil time:
//!
//! - **Day of week**: not computed from the date; it is only incremented at
//!   each midnight rollover from whatever value it was seeded with.
//! - **Leap year**: any year evenly divisible by 4 gets a Feb 29th. Century
//!   years that are not leap years still get one, exactly like the chip.

mod datetime;
mod filter;

pub use self::datetime::{DateTime, DayOfWeek, Error};
pub use self::filter::AlarmFilter;

use crate::buffer::STAMP_SIZE;
use core::fmt::Write;

/// A real time clock with a single alarm.
#[derive(Debug, Clone)]
pub struct Rtc {
    now: DateTime,
    alarm: AlarmFilter,
    alarm_enabled: bool,
}

impl Rtc {
    /// Creates a clock seeded with `initial`, alarm armed to fire every tick.
    ///
    /// # Errors
    ///
    /// Returns the relevant [`Error`] if `initial` is out of range.
    pub fn new(initial: DateTime) -> Result<Self, Error> {
        datetime::validate_datetime(&initial)?;
        Ok(Rtc {
            now: initial,
            alarm: AlarmFilter::every_second(),
            alarm_enabled: true,
        })
    }

    /// The current date and time.
    pub fn now(&self) -> DateTime {
        self.now
    }

    /// Sets the clock to a new value.
    ///
    /// # Errors
    ///
    /// Returns the relevant [`Error`] if `t` is out of range.
    pub fn set_datetime(&mut self, t: DateTime) -> Result<(), Error> {
        datetime::validate_datetime(&t)?;
        self.now = t;
        Ok(())
    }

    /// Replaces the alarm filter.
    pub fn set_alarm(&mut self, filter: AlarmFilter) {
        self.alarm = filter;
    }

    /// Masks or unmasks the alarm interrupt.
    pub fn set_alarm_enabled(&mut self, enabled: bool) {
        self.alarm_enabled = enabled;
    }

    /// Advances the clock one second; returns whether the alarm fired.
    pub fn tick_second(&mut self) -> bool {
        datetime::advance_second(&mut self.now);
        self.alarm_enabled && self.alarm.matches(&self.now)
    }
}

/// Formats `dt` into the fixed-width stamp `\r\nHH:MM:SS MM/DD/YY `.
///
/// The field is exactly [`STAMP_SIZE`] bytes with no terminator, so the
/// downstream copy always moves a fully populated region. The year is
/// truncated to two digits.
pub fn format_stamp(dt: &DateTime, out: &mut [u8; STAMP_SIZE]) {
    let mut s: heapless::String<STAMP_SIZE> = heapless::String::new();
    // Every field is range-limited to two digits; this exactly fills the
    // capacity and cannot fail.
    let _ = write!(
        s,
        "\r\n{:02}:{:02}:{:02} {:02}/{:02}/{:02} ",
        dt.hour,
        dt.minute,
        dt.second,
        dt.month,
        dt.day,
        dt.year % 100
    );
    let n = s.len().min(STAMP_SIZE);
    out[..n].copy_from_slice(&s.as_bytes()[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime {
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
    fn rejects_invalid_initial_datetime() {
        let mut dt = start();
        dt.second = 61;
        assert!(matches!(Rtc::new(dt), Err(Error::InvalidSecond)));
    }

    #[test]
    fn every_second_alarm_fires_each_tick() {
        let mut rtc = Rtc::new(start()).unwrap();
        assert!(rtc.tick_second());
        assert!(rtc.tick_second());
        assert_eq!(rtc.now().second, 2);
    }

    #[test]
    fn masked_alarm_does_not_fire() {
        let mut rtc = Rtc::new(start()).unwrap();
        rtc.set_alarm_enabled(false);
        assert!(!rtc.tick_second());
    }

    #[test]
    fn filtered_alarm_fires_on_match_only() {
        let mut rtc = Rtc::new(start()).unwrap();
        rtc.set_alarm(AlarmFilter::every_second().second(3));
        assert!(!rtc.tick_second()); // :01
        assert!(!rtc.tick_second()); // :02
        assert!(rtc.tick_second()); // :03
    }

    #[test]
    fn stamp_is_exactly_twenty_bytes() {
        let mut out = [0u8; STAMP_SIZE];
        format_stamp(&start(), &mut out);
        assert_eq!(&out, b"\r\n12:00:00 03/30/17 ");
    }

    #[test]
    fn stamp_truncates_year_to_two_digits() {
        let mut dt = start();
        dt.year = 2105;
        dt.hour = 7;
        dt.minute = 9;
        dt.second = 59;
        let mut out = [0u8; STAMP_SIZE];
        format_stamp(&dt, &mut out);
        assert_eq!(&out, b"\r\n07:09:59 03/30/05 ");
    }
}
