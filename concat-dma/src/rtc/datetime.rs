/// Errors regarding the [`DateTime`] struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The [DateTime] contains an invalid year value. Must be between `0..=4095`.
    InvalidYear,
    /// The [DateTime] contains an invalid month value. Must be between `1..=12`.
    InvalidMonth,
    /// The [DateTime] contains an invalid day value. Must be between `1..=31`.
    InvalidDay,
    /// The [DateTime] contains an invalid day of week. Must be between `0..=6` where 0 is Sunday.
    InvalidDayOfWeek(
        /// The value of the DayOfWeek that was given.
        u8,
    ),
    /// The [DateTime] contains an invalid hour value. Must be between `0..=23`.
    InvalidHour,
    /// The [DateTime] contains an invalid minute value. Must be between `0..=59`.
    InvalidMinute,
    /// The [DateTime] contains an invalid second value. Must be between `0..=59`.
    InvalidSecond,
}

/// Structure containing date and time information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    /// 0..4095
    pub year: u16,
    /// 1..12, 1 is January
    pub month: u8,
    /// 1..28,29,30,31 depending on month
    pub day: u8,
    ///
    pub day_of_week: DayOfWeek,
    /// 0..23
    pub hour: u8,
    /// 0..59
    pub minute: u8,
    /// 0..59
    pub second: u8,
}

/// A day of the week
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

fn day_of_week_from_u8(v: u8) -> Result<DayOfWeek, Error> {
    Ok(match v {
        0 => DayOfWeek::Sunday,
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        6 => DayOfWeek::Saturday,
        x => return Err(Error::InvalidDayOfWeek(x)),
    })
}

pub(super) fn validate_datetime(dt: &DateTime) -> Result<(), Error> {
    if dt.year > 4095 {
        Err(Error::InvalidYear)
    } else if dt.month < 1 || dt.month > 12 {
        Err(Error::InvalidMonth)
    } else if dt.day < 1 || dt.day > 31 {
        Err(Error::InvalidDay)
    } else if dt.hour > 23 {
        Err(Error::InvalidHour)
    } else if dt.minute > 59 {
        Err(Error::InvalidMinute)
    } else if dt.second > 59 {
        Err(Error::InvalidSecond)
    } else {
        Ok(())
    }
}

fn days_in_month(month: u8, year: u16) -> u8 {
    // Leap rule matches the RTC hardware: any year divisible by 4 gets a
    // Feb 29th, century years included.
    match month {
        2 => {
            if year % 4 == 0 {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Advances `dt` by one second, rolling over time, date, and day of week.
pub(super) fn advance_second(dt: &mut DateTime) {
    dt.second += 1;
    if dt.second < 60 {
        return;
    }
    dt.second = 0;
    dt.minute += 1;
    if dt.minute < 60 {
        return;
    }
    dt.minute = 0;
    dt.hour += 1;
    if dt.hour < 24 {
        return;
    }
    dt.hour = 0;
    // Like the hardware, the day of week is merely incremented.
    dt.day_of_week =
        day_of_week_from_u8((dt.day_of_week as u8 + 1) % 7).unwrap_or(DayOfWeek::Sunday);
    dt.day += 1;
    if dt.day <= days_in_month(dt.month, dt.year) {
        return;
    }
    dt.day = 1;
    dt.month += 1;
    if dt.month <= 12 {
        return;
    }
    dt.month = 1;
    // The year counter wraps at its 12-bit range.
    dt.year = if dt.year >= 4095 { 0 } else { dt.year + 1 };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> DateTime {
        DateTime {
            year,
            month,
            day,
            day_of_week: DayOfWeek::Thursday,
            hour,
            minute,
            second,
        }
    }

    #[test]
    fn validate_ranges() {
        assert!(validate_datetime(&at(2017, 3, 30, 12, 0, 0)).is_ok());
        assert_eq!(
            validate_datetime(&at(5000, 1, 1, 0, 0, 0)),
            Err(Error::InvalidYear)
        );
        assert_eq!(
            validate_datetime(&at(2017, 13, 1, 0, 0, 0)),
            Err(Error::InvalidMonth)
        );
        assert_eq!(
            validate_datetime(&at(2017, 1, 1, 24, 0, 0)),
            Err(Error::InvalidHour)
        );
    }

    #[test]
    fn second_rollover() {
        let mut dt = at(2017, 3, 30, 12, 0, 59);
        advance_second(&mut dt);
        assert_eq!((dt.minute, dt.second), (1, 0));
    }

    #[test]
    fn midnight_rollover_advances_date_and_weekday() {
        let mut dt = at(2017, 3, 31, 23, 59, 59);
        advance_second(&mut dt);
        assert_eq!((dt.month, dt.day), (4, 1));
        assert_eq!((dt.hour, dt.minute, dt.second), (0, 0, 0));
        assert_eq!(dt.day_of_week, DayOfWeek::Friday);
    }

    #[test]
    fn leap_february_has_29_days() {
        let mut dt = at(2016, 2, 28, 23, 59, 59);
        advance_second(&mut dt);
        assert_eq!((dt.month, dt.day), (2, 29));

        let mut dt = at(2017, 2, 28, 23, 59, 59);
        advance_second(&mut dt);
        assert_eq!((dt.month, dt.day), (3, 1));
    }

    #[test]
    fn year_rollover() {
        let mut dt = at(2017, 12, 31, 23, 59, 59);
        advance_second(&mut dt);
        assert_eq!((dt.year, dt.month, dt.day), (2018, 1, 1));
    }
}
