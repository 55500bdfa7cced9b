//! Drawing of vehicle boxes, their `{id}-{label}` captions and the
//! reference lines.

use ndarray::s;

use crate::frame::{self, Image};
use crate::geometry::BBox;
use crate::speed::CrossingLines;

pub type Rgb = [u8; 3];

pub const VEHICLE_COLOR: Rgb = [0, 255, 0];
pub const ENTRY_LINE_COLOR: Rgb = [0, 255, 255];
pub const EXIT_LINE_COLOR: Rgb = [255, 0, 0];
const THICKNESS: i32 = 2;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;
/// Gap between a caption and the top of its box.
const LABEL_GAP: i32 = 2;

/// Annotates frames in place.
#[derive(Debug, Clone, Copy)]
pub struct Overlay {
    lines: CrossingLines,
}

impl Overlay {
    pub fn new(lines: CrossingLines) -> Self {
        Self { lines }
    }

    /// Box plus `label` above it, or just inside when the box touches the top.
    pub fn draw_vehicle(&self, image: &mut Image, bbox: &BBox, label: &str) {
        draw_rect(image, bbox, VEHICLE_COLOR, THICKNESS);
        let above = bbox.y1 - GLYPH_HEIGHT - LABEL_GAP;
        let y = if above >= 0 { above } else { bbox.y1 + THICKNESS + 1 };
        draw_label(image, bbox.x1, y, label, VEHICLE_COLOR);
    }

    pub fn draw_lines(&self, image: &mut Image) {
        draw_hline(image, self.lines.entry_y(), ENTRY_LINE_COLOR, THICKNESS);
        draw_hline(image, self.lines.exit_y(), EXIT_LINE_COLOR, THICKNESS);
    }
}

fn fill(image: &mut Image, region: BBox, color: Rgb) {
    let (width, height) = frame::dimensions(image);
    let r = region.clamp_to(width, height);
    if r.is_empty() {
        return;
    }
    let mut view = image.slice_mut(s![
        r.y1 as usize..r.y2 as usize,
        r.x1 as usize..r.x2 as usize,
        ..
    ]);
    for mut pixel in view.rows_mut() {
        pixel.assign(&ndarray::aview1(&color));
    }
}

/// Outline `bbox` with a border growing inwards from its edges.
pub fn draw_rect(image: &mut Image, bbox: &BBox, color: Rgb, thickness: i32) {
    let BBox { x1, y1, x2, y2 } = *bbox;
    let t = thickness.max(1);
    fill(image, BBox::new(x1, y1, x2, y1 + t), color);
    fill(image, BBox::new(x1, y2 - t, x2, y2), color);
    fill(image, BBox::new(x1, y1, x1 + t, y2), color);
    fill(image, BBox::new(x2 - t, y1, x2, y2), color);
}

/// Full-width horizontal line starting at row `y`.
pub fn draw_hline(image: &mut Image, y: i32, color: Rgb, thickness: i32) {
    let (width, _) = frame::dimensions(image);
    let width = i32::try_from(width).unwrap_or(i32::MAX);
    fill(image, BBox::new(0, y, width, y + thickness.max(1)), color);
}

/// Render `text` in a 5x7 bitmap font with its top-left corner at (`x`, `y`).
///
/// Letters are drawn upper-case. Characters outside the font leave a gap.
pub fn draw_label(image: &mut Image, x: i32, y: i32, text: &str, color: Rgb) {
    let (width, height) = frame::dimensions(image);
    let (width, height) = (width as i32, height as i32);
    let mut cursor = x;

    for ch in text.chars() {
        if let Some(glyph) = glyph_bits(ch.to_ascii_uppercase()) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..GLYPH_WIDTH {
                    let px = cursor + col;
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 && px >= 0 && px < width {
                        image
                            .slice_mut(s![py as usize, px as usize, ..])
                            .assign(&ndarray::aview1(&color));
                    }
                }
            }
        }
        cursor += GLYPH_ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let glyph = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        _ => return None,
    };
    Some(glyph)
}
