//! Temporal types as the protocol represents them: microsecond and day
//! counts relative to the year-2000 epoch, without timezone math.

/// Number of seconds between the Unix epoch and 2000-01-01 UTC
pub const POSTGRES_EPOCH_UNIX_SECS: i64 = 946_684_800;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration {
    pub(crate) micros: i64,
}

/// A point in time, microseconds since 2000-01-01 00:00 UTC
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Datetime {
    pub(crate) micros: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalDatetime {
    pub(crate) micros: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalDate {
    pub(crate) days: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTime {
    pub(crate) micros: i64,
}

impl Duration {
    pub fn from_micros(micros: i64) -> Duration {
        Duration { micros }
    }
    pub fn micros(&self) -> i64 {
        self.micros
    }
    pub fn is_negative(&self) -> bool {
        self.micros.is_negative()
    }
    /// Absolute value as the stdlib's duration
    ///
    /// Note: `std::time::Duration` can't be negative
    pub fn abs_duration(&self) -> std::time::Duration {
        if self.micros.is_negative() {
            std::time::Duration::from_micros(u64::MAX - self.micros as u64 + 1)
        } else {
            std::time::Duration::from_micros(self.micros as u64)
        }
    }
}

impl Datetime {
    pub fn from_micros(micros: i64) -> Datetime {
        Datetime { micros }
    }
    pub fn micros(&self) -> i64 {
        self.micros
    }
    pub fn from_unix_micros(micros: i64) -> Datetime {
        Datetime {
            micros: micros - POSTGRES_EPOCH_UNIX_SECS * 1_000_000,
        }
    }
    pub fn to_unix_micros(&self) -> i64 {
        self.micros + POSTGRES_EPOCH_UNIX_SECS * 1_000_000
    }
}

impl LocalDatetime {
    pub fn from_micros(micros: i64) -> LocalDatetime {
        LocalDatetime { micros }
    }
    pub fn micros(&self) -> i64 {
        self.micros
    }
}

impl LocalDate {
    pub fn from_days(days: i32) -> LocalDate {
        LocalDate { days }
    }
    pub fn days(&self) -> i32 {
        self.days
    }
}

impl LocalTime {
    /// Time since midnight; must be less than 24 hours
    pub fn from_micros(micros: u64) -> LocalTime {
        assert!(micros < 86_400 * 1_000_000);
        LocalTime {
            micros: micros as i64,
        }
    }
    pub fn micros(&self) -> i64 {
        self.micros
    }
}

#[cfg(test)]
mod test {
    #[test]
    fn big_duration_abs() {
        use super::Duration as Src;
        use std::time::Duration as Trg;
        assert_eq!(Src { micros: -1 }.abs_duration(), Trg::new(0, 1000));
        assert_eq!(Src { micros: -1000 }.abs_duration(), Trg::new(0, 1000000));
        assert_eq!(Src { micros: -1000000 }.abs_duration(), Trg::new(1, 0));
        assert_eq!(
            Src { micros: i64::MIN }.abs_duration(),
            Trg::new(9223372036854, 775808000)
        );
    }

    #[test]
    fn unix_conversion() {
        use super::Datetime;
        let dt = Datetime::from_unix_micros(946_684_800_000_000);
        assert_eq!(dt.micros(), 0);
        assert_eq!(dt.to_unix_micros(), 946_684_800_000_000);
    }
}
