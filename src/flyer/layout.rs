//! Flyer layout
//!
//! Positions are fractions of the page, so the table reads the same way the
//! printed flyer is laid out. Text anchors are the center of each line.

use super::schedule::Meeting;
use super::MeetingState;
use crate::config::FlyerConfig;

/// Top-left corners of the photo slots. The last slot holds the large photo.
pub const PHOTO_SLOTS: [(f64, f64); 5] = [
    (0.03, 0.15),
    (0.81, 0.15),
    (0.03, 0.6),
    (0.80, 0.6),
    (0.35, 0.68),
];

/// Photo size as a fraction of the page
pub const SMALL_PHOTO: f64 = 0.15;
pub const LARGE_PHOTO: f64 = 0.3;

pub const JOIN_US: &str = "Join us for a day of fun";
pub const CANCELLED: &str = "Meeting will not be held";
pub const PIZZA: [&str; 2] = ["Free Pizza", "and Soda!"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    /// 48 px body text
    Body,
    /// 24 px footer text
    Footer,
}

impl TextSize {
    pub const fn px(self) -> f32 {
        match self {
            Self::Body => 48.0,
            Self::Footer => 24.0,
        }
    }
}

/// One centered line of text
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub size: TextSize,
}

impl TextLine {
    fn body(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size: TextSize::Body,
        }
    }

    fn footer(text: impl Into<String>, y: f64) -> Self {
        Self {
            text: text.into(),
            x: 0.9,
            y,
            size: TextSize::Footer,
        }
    }
}

/// Every text line on the flyer, in drawing order
pub fn flyer_text(state: MeetingState, meeting: &Meeting, config: &FlyerConfig) -> Vec<TextLine> {
    let mut lines = vec![TextLine::body(config.title.as_str(), 0.5, 0.1)];

    match state {
        MeetingState::Pizza => {
            lines.push(TextLine::body(PIZZA[0], 0.17, 0.85));
            lines.push(TextLine::body(PIZZA[1], 0.17, 0.90));
            lines.push(TextLine::body(JOIN_US, 0.5, 0.25));
        }
        MeetingState::Normal => lines.push(TextLine::body(JOIN_US, 0.5, 0.25)),
        MeetingState::Cancelled => lines.push(TextLine::body(CANCELLED, 0.5, 0.25)),
        MeetingState::Day => {}
    }

    lines.push(TextLine::body(meeting.day_name(), 0.5, 0.35));
    lines.push(TextLine::body(meeting.time_range(), 0.5, 0.4));
    lines.push(TextLine::body(meeting.full_date(), 0.5, 0.45));

    for (line, y) in config.venue.iter().zip([0.55, 0.6, 0.65]) {
        lines.push(TextLine::body(line.as_str(), 0.5, y));
    }
    for (line, y) in config.footer.iter().zip([0.9, 0.93]) {
        lines.push(TextLine::footer(line.as_str(), y));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::{DateTime, Utc};

    fn text_for(state: MeetingState) -> Vec<String> {
        let cfg = Config::from_defaults();
        let now = DateTime::parse_from_rfc3339("2024-03-05T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let meeting = cfg.schedule().unwrap().next_meeting(&now);
        flyer_text(state, &meeting, &cfg.flyer)
            .into_iter()
            .map(|l| l.text)
            .collect()
    }

    fn has(lines: &[String], text: &str) -> bool {
        lines.iter().any(|l| l == text)
    }

    #[test]
    fn test_pizza_falls_through_to_join_us() {
        let lines = text_for(MeetingState::Pizza);
        assert!(has(&lines, PIZZA[0]));
        assert!(has(&lines, PIZZA[1]));
        assert!(has(&lines, JOIN_US));
        assert!(!has(&lines, CANCELLED));
    }

    #[test]
    fn test_normal_only_joins() {
        let lines = text_for(MeetingState::Normal);
        assert!(has(&lines, JOIN_US));
        assert!(!has(&lines, CANCELLED));
        assert!(!has(&lines, PIZZA[0]));
    }

    #[test]
    fn test_cancelled_only_cancels() {
        let lines = text_for(MeetingState::Cancelled);
        assert!(has(&lines, CANCELLED));
        assert!(!has(&lines, JOIN_US));
        assert!(!has(&lines, PIZZA[0]));
    }

    #[test]
    fn test_day_state_has_no_message() {
        let lines = text_for(MeetingState::Day);
        assert!(!has(&lines, JOIN_US));
        assert!(!has(&lines, CANCELLED));
        assert!(has(&lines, "Thursday"));
    }

    #[test]
    fn test_common_block() {
        let lines = text_for(MeetingState::Normal);
        for expected in [
            "Board of Bored Board Game Players",
            "Thursday",
            "3:30 - 5:30 pm",
            "March 14, 2024",
            "Harmon Meeting Room",
            "Local History Center",
            "Bryan, Ohio",
            "More info:",
            "bbbgp.org",
        ] {
            assert!(has(&lines, expected), "missing {expected}");
        }
    }

    #[test]
    fn test_footer_uses_small_text() {
        let cfg = Config::from_defaults();
        let meeting = cfg.schedule().unwrap().next_meeting(&Utc::now());
        let lines = flyer_text(MeetingState::Normal, &meeting, &cfg.flyer);
        let footer: Vec<_> = lines.iter().filter(|l| l.size == TextSize::Footer).collect();
        assert_eq!(footer.len(), 2);
        assert!(footer.iter().all(|l| (l.x - 0.9).abs() < f64::EPSILON));
    }
}
