//! Flyer generator
//!
//! Renders the meeting flyer: next meeting date, five random photos from the
//! pool and the state-specific announcement, on a letter-sized canvas.
//! Every failure is returned to the caller; nothing here exits the process.

pub mod canvas;
pub mod layout;
pub mod pool;
pub mod schedule;

use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, TimeZone};
use image::{ImageFormat, RgbaImage};
use rand::Rng;
use thiserror::Error;

use crate::config::FlyerConfig;

pub use schedule::Schedule;

/// Bitstream Vera licensed font bundled for rendering tests
#[cfg(test)]
pub const TEST_FONT: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");

/// Which announcement the flyer carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingState {
    /// Date block only; not reachable from any route
    #[allow(dead_code)]
    Day,
    Normal,
    Cancelled,
    /// Pizza notice plus the regular invitation
    Pizza,
}

#[derive(Debug, Error)]
pub enum FlyerError {
    #[error("cannot read image directory {path}: {source}")]
    PoolUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("image pool has {found} photos, {needed} needed")]
    NotEnoughImages { found: usize, needed: usize },

    #[error("cannot decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot read font {path}: {source}")]
    FontUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("font {path} is not a usable TrueType font")]
    FontInvalid { path: String },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Render the flyer for `state` as seen at `now`
pub fn render<Tz: TimeZone, R: Rng + ?Sized>(
    state: MeetingState,
    config: &FlyerConfig,
    schedule: &Schedule,
    now: &DateTime<Tz>,
    rng: &mut R,
) -> Result<RgbaImage, FlyerError> {
    let meeting = schedule.next_meeting(now);

    let entries = pool::list_pool(Path::new(&config.image_dir))?;
    let chosen = pool::choose_photos(&entries, rng)?;

    let mut photos = Vec::with_capacity(chosen.len());
    for (i, path) in chosen.iter().enumerate() {
        let photo = image::open(path).map_err(|source| FlyerError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        photos.push(canvas::fit_photo(&photo, i + 1 == chosen.len()));
    }

    let font = canvas::load_font(Path::new(&config.font_path))?;

    let mut page = canvas::compose_photos(&photos);
    let lines = layout::flyer_text(state, &meeting, config);
    canvas::draw_lines(&mut page, &font, &lines);
    Ok(page)
}

pub fn encode_png(page: &RgbaImage) -> Result<Vec<u8>, FlyerError> {
    let mut buf = Cursor::new(Vec::new());
    page.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
