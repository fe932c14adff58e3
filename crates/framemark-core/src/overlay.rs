use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::{debug, info};

/// Monospace fonts looked up when no font is given explicitly.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "C:\\Windows\\Fonts\\consola.ttf",
];

/// Distance of the text's left edge from the right edge of the frame.
const TEXT_RIGHT_OFFSET: u32 = 180;
const TEXT_TOP: i32 = 20;
const TEXT_SCALE: f32 = 32.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_THICKNESS: i32 = 2;

/// Field width of the frame counter.
const COUNTER_WIDTH: usize = 8;

const GLYPH_SCALE: i32 = 3;
const GLYPH_ADVANCE: i32 = 6;

/// Text burned into the frame with the given index.
pub fn overlay_text(frame_index: u64) -> String {
    format!("{frame_index:>width$}", width = COUNTER_WIDTH)
}

/// Burns a frame counter into the top-right corner of frames.
pub struct FrameAnnotator {
    font: Option<FontVec>,
}

impl FrameAnnotator {
    /// Load `font_path` if given, otherwise the first available system font.
    /// Without any font the counter is drawn with built-in digit glyphs.
    pub fn new(font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => Some(load_font(path)?),
            None => find_system_font(),
        };
        if font.is_none() {
            info!("no font available, using built-in digit glyphs");
        }
        Ok(Self { font })
    }

    #[cfg(test)]
    pub(crate) fn with_font(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn annotate(&self, img: &mut RgbImage, frame_index: u64) {
        let text = overlay_text(frame_index);
        let x = img.width().saturating_sub(TEXT_RIGHT_OFFSET) as i32;

        for dy in 0..TEXT_THICKNESS {
            for dx in 0..TEXT_THICKNESS {
                match &self.font {
                    Some(font) => draw_text_mut(
                        img,
                        TEXT_COLOR,
                        x + dx,
                        TEXT_TOP + dy,
                        PxScale::from(TEXT_SCALE),
                        font,
                        &text,
                    ),
                    None => draw_glyphs(img, x + dx, TEXT_TOP + dy, &text),
                }
            }
        }
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read font file {}", path.display()))?;
    let font = FontVec::try_from_vec(data)
        .with_context(|| format!("failed to parse font file {}", path.display()))?;
    info!(?path, "loaded overlay font");
    Ok(font)
}

fn find_system_font() -> Option<FontVec> {
    FONT_CANDIDATES.iter().map(Path::new).find_map(|path| {
        if !path.is_file() {
            return None;
        }
        match load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                debug!(?path, error = %e, "skipping font candidate");
                None
            }
        }
    })
}

/// Draw text with 5x7 bitmap glyphs, clipped to the image.
fn draw_glyphs(img: &mut RgbImage, mut x: i32, y: i32, text: &str) {
    let (width, height) = (img.width() as i32, img.height() as i32);
    for ch in text.chars() {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 0 {
                        continue;
                    }
                    for sy in 0..GLYPH_SCALE {
                        for sx in 0..GLYPH_SCALE {
                            let px = x + col * GLYPH_SCALE + sx;
                            let py = y + row as i32 * GLYPH_SCALE + sy;
                            if px >= 0 && px < width && py >= 0 && py < height {
                                img.put_pixel(px as u32, py as u32, TEXT_COLOR);
                            }
                        }
                    }
                }
            }
        }
        x += GLYPH_ADVANCE * GLYPH_SCALE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some([0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        _ => None,
    }
}
