//! Raster drawing: photo placement and centered text

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use super::layout::{TextLine, LARGE_PHOTO, PHOTO_SLOTS, SMALL_PHOTO};
use super::FlyerError;

/// Letter size at 96 dpi
pub const PAGE_WIDTH: u32 = 816;
pub const PAGE_HEIGHT: u32 = 1056;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub fn load_font(path: &Path) -> Result<Font<'static>, FlyerError> {
    let bytes = std::fs::read(path).map_err(|source| FlyerError::FontUnreadable {
        path: path.display().to_string(),
        source,
    })?;
    Font::try_from_vec(bytes).ok_or_else(|| FlyerError::FontInvalid {
        path: path.display().to_string(),
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn page_fraction(fraction: f64) -> (u32, u32) {
    (
        (f64::from(PAGE_WIDTH) * fraction) as u32,
        (f64::from(PAGE_HEIGHT) * fraction) as u32,
    )
}

#[allow(clippy::cast_possible_truncation)]
fn slot_origin((fx, fy): (f64, f64)) -> (i64, i64) {
    (
        (f64::from(PAGE_WIDTH) * fx) as i64,
        (f64::from(PAGE_HEIGHT) * fy) as i64,
    )
}

/// Stretch a photo to its slot size; the last slot gets the large size
pub fn fit_photo(photo: &DynamicImage, large: bool) -> RgbaImage {
    let (w, h) = page_fraction(if large { LARGE_PHOTO } else { SMALL_PHOTO });
    photo.resize_exact(w, h, FilterType::Lanczos3).to_rgba8()
}

/// White page with the photos placed in their slots
pub fn compose_photos(photos: &[RgbaImage]) -> RgbaImage {
    let mut page = RgbaImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, WHITE);
    for (photo, slot) in photos.iter().zip(PHOTO_SLOTS) {
        let (x, y) = slot_origin(slot);
        imageops::overlay(&mut page, photo, x, y);
    }
    page
}

pub fn draw_lines(page: &mut RgbaImage, font: &Font<'static>, lines: &[TextLine]) {
    for line in lines {
        #[allow(clippy::cast_possible_truncation)]
        let (cx, cy) = (
            (f64::from(PAGE_WIDTH) * line.x) as f32,
            (f64::from(PAGE_HEIGHT) * line.y) as f32,
        );
        draw_text_center(page, font, line.size.px(), cx, cy, BLACK, &line.text);
    }
}

/// Scale at which the font's em square is `px` pixels tall.
///
/// rusttype scales by line height (ascent to descent), font sizes name the em.
fn em_scale(font: &Font<'static>, px: f32) -> Scale {
    let vm = font.v_metrics_unscaled();
    let units = f32::from(font.units_per_em());
    Scale::uniform(px * (vm.ascent - vm.descent) / units)
}

fn text_width(font: &Font<'static>, scale: Scale, text: &str) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map_or(0.0, |g| {
            g.position().x + g.unpositioned().h_metrics().advance_width
        })
}

/// Draw `text` so that its box is centered on (cx, cy)
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
fn draw_text_center(
    img: &mut RgbaImage,
    font: &Font<'static>,
    px: f32,
    cx: f32,
    cy: f32,
    color: Rgba<u8>,
    text: &str,
) {
    let scale = em_scale(font, px);
    let vm = font.v_metrics(scale);
    let height = (vm.ascent - vm.descent).max(1.0);
    let origin = point(
        cx - text_width(font, scale, text) / 2.0,
        cy - height / 2.0 + vm.ascent,
    );

    for glyph in font.layout(text, scale, origin) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = gx as i32 + bb.min.x;
            let y = gy as i32 + bb.min.y;
            if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
                return;
            }
            let dst = img.get_pixel_mut(x as u32, y as u32);
            let inv = 1.0 - coverage;
            for (d, s) in dst.0.iter_mut().zip(color.0).take(3) {
                *d = (f32::from(s) * coverage + f32::from(*d) * inv) as u8;
            }
            dst.0[3] = 255;
        });
    }
}
