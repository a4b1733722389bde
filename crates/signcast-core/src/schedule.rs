use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// All seven weekdays, Monday first (bit 0 = Monday).
pub const EVERY_DAY: u8 = 0b0111_1111;

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    AlwaysVisible,
    AlwaysHidden,
    VisibleOnTime,
    HiddenOnTime,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::AlwaysVisible => "always_visible",
            Visibility::AlwaysHidden => "always_hidden",
            Visibility::VisibleOnTime => "visible_on_time",
            Visibility::HiddenOnTime => "hidden_on_time",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A scene's visibility policy: a visibility mode, a `[from, to)` time-of-day
/// window and a Monday-first day-of-week bitmask. The window and mask only
/// matter for the two `*OnTime` modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "type")]
    pub visibility: Visibility,
    #[serde(with = "hhmm")]
    pub from: NaiveTime,
    #[serde(with = "hhmm")]
    pub to: NaiveTime,
    pub day_of_week: u8,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            visibility: Visibility::AlwaysVisible,
            from: NaiveTime::MIN,
            to: NaiveTime::MIN,
            day_of_week: EVERY_DAY,
        }
    }
}

impl Schedule {
    pub fn new(visibility: Visibility, from: NaiveTime, to: NaiveTime, day_of_week: u8) -> Self {
        Self {
            visibility,
            from,
            to,
            day_of_week: day_of_week & EVERY_DAY,
        }
    }

    fn in_window(&self, at: NaiveDateTime) -> bool {
        use chrono::Datelike;
        let day_bit = 1u8 << at.weekday().num_days_from_monday();
        if self.day_of_week & day_bit == 0 {
            return false;
        }
        let t = at.time();
        t >= self.from && t < self.to
    }

    /// Evaluate the policy at a wall-clock instant.
    pub fn is_visible_at(&self, at: NaiveDateTime) -> bool {
        match self.visibility {
            Visibility::AlwaysVisible => true,
            Visibility::AlwaysHidden => false,
            Visibility::VisibleOnTime => self.in_window(at),
            Visibility::HiddenOnTime => !self.in_window(at),
        }
    }
}

// HH:MM (de)serialization for the schedule window.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(de)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
