//! Pure wall-clock logic with no platform dependencies.
//! Testable on host, shared by the scheduler and the view-state layer.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("expected HH:MM, got {0:?}")]
    Malformed(String),
    #[error("hour {0} out of range 0-23")]
    HourOutOfRange(u32),
    #[error("minute {0} out of range 0-59")]
    MinuteOutOfRange(u32),
    #[error("expected YYYY-MM, got {0:?}")]
    MalformedMonth(String),
}

/// A valid 24-hour wall-clock time of day (no date attached).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct WallTime {
    hour: u8,
    minute: u8,
}

impl WallTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeError> {
        if hour > 23 {
            return Err(TimeError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(TimeError::MinuteOutOfRange(minute));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour as u32
    }

    pub fn minute(&self) -> u32 {
        self.minute as u32
    }

    /// This time of day on the given date, at second zero.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        let time = NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0)
            .expect("validated on construction");
        date.and_time(time)
    }
}

impl FromStr for WallTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.splitn(2, ':');
        let (hour, minute) = match (parts.next(), parts.next()) {
            (Some(h), Some(m)) => (h.trim(), m.trim()),
            _ => return Err(TimeError::Malformed(s.to_string())),
        };
        let hour: u32 = hour
            .parse()
            .map_err(|_| TimeError::Malformed(s.to_string()))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| TimeError::Malformed(s.to_string()))?;
        WallTime::new(hour, minute)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Next absolute instant at or after `now` matching `time`.
///
/// If today's instant is still in the future it is used as-is; if it has
/// already passed, or is exactly `now`, the same wall-clock time tomorrow is
/// returned. Rolling over uses date arithmetic rather than a fixed offset so
/// the boundary exactly at the target second lands on the next day.
pub fn next_occurrence(now: NaiveDateTime, time: WallTime) -> NaiveDateTime {
    let today = time.on(now.date());
    if today > now {
        today
    } else {
        match now.date().succ_opt() {
            Some(tomorrow) => time.on(tomorrow),
            // Calendar end; nothing later exists to roll to.
            None => today,
        }
    }
}

/// Format a countdown as "HH:MM:SS". Negative durations clamp to zero.
pub fn format_countdown(remaining: Duration) -> String {
    let total_secs = remaining.num_seconds().max(0);
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Greeting {
    Night,
    Morning,
    Noon,
    Afternoon,
    Evening,
}

impl Greeting {
    pub fn phrase(&self) -> &'static str {
        match self {
            Greeting::Night => "Good night",
            Greeting::Morning => "Good morning",
            Greeting::Noon => "Good noon",
            Greeting::Afternoon => "Good afternoon",
            Greeting::Evening => "Good evening",
        }
    }
}

/// Greeting bucket for a local hour of day.
pub fn greeting_for_hour(hour: u32) -> Greeting {
    match hour {
        0..=5 => Greeting::Night,
        6..=10 => Greeting::Morning,
        11..=12 => Greeting::Noon,
        13..=17 => Greeting::Afternoon,
        _ => Greeting::Evening,
    }
}

/// A calendar month, parsed from "YYYY-MM", used to filter meal history.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, TimeError> {
        if !(1..=12).contains(&month) {
            return Err(TimeError::MalformedMonth(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for MonthKey {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.splitn(2, '-');
        let (year, month) = match (parts.next(), parts.next()) {
            (Some(y), Some(m)) => (y.trim(), m.trim()),
            _ => return Err(TimeError::MalformedMonth(s.to_string())),
        };
        let year: i32 = year
            .parse()
            .map_err(|_| TimeError::MalformedMonth(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| TimeError::MalformedMonth(s.to_string()))?;
        MonthKey::new(year, month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
