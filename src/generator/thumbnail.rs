//! Card thumbnail composition.
//!
//! Thumbnails are 300x400 PNG cards: the source photo scaled into the top
//! area, the display title underneath, and an optional badge line at the
//! bottom. Text is rasterized from the 8x8 bitmap font, scaled up in whole
//! pixels.

use std::io::Cursor;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{imageops, DynamicImage, Rgba, RgbaImage};

use super::GeneratorError;
use crate::images::ImagePayload;

pub const THUMB_WIDTH: u32 = 300;
pub const THUMB_HEIGHT: u32 = 400;

const INSET: u32 = 20;
const IMAGE_AREA_HEIGHT: u32 = 200;

const GLYPH_SIZE: u32 = 8;
const TITLE_SCALE: u32 = 2;
const BADGE_SCALE: u32 = 1;
const TITLE_TOP: u32 = THUMB_HEIGHT - 100;
const BADGE_TOP: u32 = THUMB_HEIGHT - 30;

const BACKGROUND: Rgba<u8> = Rgba([248, 248, 248, 255]);
const TITLE_COLOR: Rgba<u8> = Rgba([25, 25, 30, 255]);
const BADGE_COLOR: Rgba<u8> = Rgba([70, 130, 230, 255]);

/// Composes the card thumbnail and returns it PNG-encoded.
///
/// Only the display prefix of the title (text before the first " - ") is
/// drawn, wrapped to at most three lines.
pub fn compose_thumbnail(
    image: Option<&ImagePayload>,
    title: &str,
    badge: Option<&str>,
) -> Result<Vec<u8>, GeneratorError> {
    let mut canvas = RgbaImage::from_pixel(THUMB_WIDTH, THUMB_HEIGHT, BACKGROUND);

    if let Some(payload) = image {
        let decoded = image::load_from_memory(&payload.bytes)?;
        let area_width = THUMB_WIDTH - 2 * INSET;
        let scaled = decoded.resize(area_width, IMAGE_AREA_HEIGHT, imageops::FilterType::Triangle);
        let x = INSET + (area_width - scaled.width()) / 2;
        let y = INSET + (IMAGE_AREA_HEIGHT - scaled.height()) / 2;
        imageops::overlay(&mut canvas, &scaled.to_rgba8(), i64::from(x), i64::from(y));
    }

    let label = display_title(title);
    let max_cols = ((THUMB_WIDTH - 2 * INSET) / (GLYPH_SIZE * TITLE_SCALE)) as usize;
    let mut line_y = TITLE_TOP;
    for line in wrap_label(&label, max_cols).into_iter().take(3) {
        draw_text(&mut canvas, &line, INSET, line_y, TITLE_SCALE, TITLE_COLOR);
        line_y += GLYPH_SIZE * TITLE_SCALE + 4;
    }

    if let Some(text) = badge {
        draw_text(&mut canvas, text, INSET, BADGE_TOP, BADGE_SCALE, BADGE_COLOR);
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Titles carry a date suffix after " - "; cards show only the prefix.
fn display_title(title: &str) -> String {
    match title.split_once(" - ") {
        Some((prefix, _)) => prefix.trim().to_string(),
        None => title.trim().to_string(),
    }
}

fn wrap_label(text: &str, max_cols: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word: String = word.chars().take(max_cols).collect();
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if !current.is_empty() && needed > max_cols {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw_text(canvas: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let mut pen_x = x;
    for ch in text.chars() {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0u8; 8]);
        for (row, row_bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if (row_bits >> col) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = pen_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < canvas.width() && py < canvas.height() {
                            canvas.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }
        pen_x += GLYPH_SIZE * scale;
        if pen_x >= canvas.width() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn solid_png(width: u32, height: u32, color: [u8; 4]) -> ImagePayload {
        let canvas = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        ImagePayload {
            id: "thumb-src".to_string(),
            path: PathBuf::from("/photos/thumb-src.png"),
            mime_type: "image/png".to_string(),
            width,
            height,
            bytes,
        }
    }

    fn has_pixel(canvas: &RgbaImage, color: Rgba<u8>) -> bool {
        canvas.pixels().any(|p| *p == color)
    }

    #[test]
    fn test_thumbnail_dimensions_and_format() {
        let bytes = compose_thumbnail(None, "Personal Biography", None).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (THUMB_WIDTH, THUMB_HEIGHT));
    }

    #[test]
    fn test_photo_lands_in_image_area() {
        let payload = solid_png(12, 8, [10, 200, 60, 255]);
        let bytes = compose_thumbnail(Some(&payload), "Title", None).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        let center = decoded.get_pixel(THUMB_WIDTH / 2, 120);
        assert!(center[0] < 30 && center[1] > 170 && center[2] < 90);
    }

    #[test]
    fn test_title_text_is_drawn() {
        let bytes = compose_thumbnail(None, "Personal Biography", None).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert!(has_pixel(&decoded, TITLE_COLOR));
    }

    #[test]
    fn test_badge_only_present_when_requested() {
        let with = compose_thumbnail(None, "Title", Some("Generated offline")).unwrap();
        let without = compose_thumbnail(None, "Title", None).unwrap();
        let with = image::load_from_memory(&with).unwrap().to_rgba8();
        let without = image::load_from_memory(&without).unwrap().to_rgba8();
        assert!(has_pixel(&with, BADGE_COLOR));
        assert!(!has_pixel(&without, BADGE_COLOR));
    }

    #[test]
    fn test_display_title_strips_date_suffix() {
        assert_eq!(display_title("Personal Biography - June 1, 2025"), "Personal Biography");
        assert_eq!(display_title("Untitled"), "Untitled");
    }

    #[test]
    fn test_wrap_label_respects_column_limit() {
        let lines = wrap_label("Personal Biography (offline)", 16);
        assert_eq!(lines, vec!["Personal".to_string(), "Biography".to_string(), "(offline)".to_string()]);
    }
}
