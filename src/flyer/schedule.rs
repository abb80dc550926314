//! Biweekly meeting schedule
//!
//! Every occurrence is derived from a single anchor timestamp. Nothing about
//! past meetings is stored: only the anchor and the current time matter.

use chrono::{DateTime, Duration, FixedOffset, TimeZone};

/// Anchor, repeat interval and meeting length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    anchor: DateTime<FixedOffset>,
    interval: Duration,
    duration: Duration,
}

/// Start and end of one occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meeting {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Schedule {
    pub const fn new(anchor: DateTime<FixedOffset>, interval: Duration, duration: Duration) -> Self {
        Self {
            anchor,
            interval,
            duration,
        }
    }

    pub const fn anchor(&self) -> DateTime<FixedOffset> {
        self.anchor
    }

    /// Next occurrence as seen from `now`.
    ///
    /// The occurrence count truncates toward zero, so any `now` before the
    /// anchor lands one interval after it. The end time is the anchor plus
    /// the meeting length, independent of `start`; only its clock time is
    /// ever printed.
    pub fn next_meeting<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Meeting {
        let elapsed = now.with_timezone(&self.anchor.timezone()) - self.anchor;
        let count = elapsed.num_seconds() / self.interval.num_seconds() + 1;

        Meeting {
            start: self.anchor + Duration::seconds(self.interval.num_seconds() * count),
            end: self.anchor + self.duration,
        }
    }
}

impl Meeting {
    /// Weekday name, e.g. "Thursday"
    pub fn day_name(&self) -> String {
        self.start.format("%A").to_string()
    }

    /// e.g. "3:30 - 5:30 pm"
    pub fn time_range(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%-I:%M"),
            self.end.format("%-I:%M %P")
        )
    }

    /// Month name, space padded day, year, e.g. "March 14, 2024"
    pub fn full_date(&self) -> String {
        self.start.format("%B %e, %Y").to_string()
    }
}
