//! Trigger-time parsing for the pickup-tomorrow flow card.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;

#[derive(thiserror::Error, Debug)]
#[error("Invalid trigger time: {0}")]
/// The configured trigger time is not a valid wall-clock time.
pub struct InvalidTriggerTime(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Wall-clock time of day after which the tomorrow-trigger may fire.
///
/// Accepts “HH:MM” and bare “HH”. The default of 20:00 matches the evening
/// reminder most households expect.
pub struct TriggerTime {
    hour: u32,
    minute: u32,
}

impl TriggerTime {
    /// Construct from hour and minute.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTriggerTime`] when hour or minute are out of range.
    pub fn new(hour: u32, minute: u32) -> Result<Self, InvalidTriggerTime> {
        if hour > 23 || minute > 59 {
            return Err(InvalidTriggerTime(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// The earliest time of day at which the trigger fires.
    #[must_use]
    pub fn as_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl Default for TriggerTime {
    fn default() -> Self {
        Self {
            hour: 20,
            minute: 0,
        }
    }
}

impl FromStr for TriggerTime {
    type Err = InvalidTriggerTime;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (hour_text, minute_text) = match trimmed.split_once(':') {
            Some((hour_text, minute_text)) => (hour_text, minute_text),
            None => (trimmed, "0"),
        };
        let hour = hour_text
            .trim()
            .parse()
            .map_err(|_error| InvalidTriggerTime(trimmed.to_owned()))?;
        let minute = minute_text
            .trim()
            .parse()
            .map_err(|_error| InvalidTriggerTime(trimmed.to_owned()))?;
        Self::new(hour, minute).map_err(|_error| InvalidTriggerTime(trimmed.to_owned()))
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:02}:{:02}", self.hour, self.minute)
    }
}
