//! Text → 1-bit bitmap.
//!
//! Font handling sits behind [`Typeface`]: the rasterizer only asks for the ascent and
//! for per-pixel glyph coverage. [`TrueTypeFace`] implements it with `ab_glyph`.
use std::path::Path;

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{GrayImage, Luma};

use super::PrintError;

pub const BLACK: Luma<u8> = Luma([0]);
pub const WHITE: Luma<u8> = Luma([255]);

/// Coverage at or above this value turns a pixel black.
const INK_THRESHOLD: f32 = 0.5;

pub trait Typeface {
    /// Distance in pixels from the top of a line to its baseline.
    fn ascent(&self) -> f32;

    /// Rasterize `ch` with its pen position at `(x, baseline)`. `plot` receives absolute
    /// pixel coordinates and a coverage in `0.0..=1.0`. Returns the horizontal advance.
    fn draw_glyph(
        &self,
        ch: char,
        x: f32,
        baseline: f32,
        plot: &mut dyn FnMut(i32, i32, f32),
    ) -> f32;
}

pub struct TrueTypeFace {
    font: FontVec,
    scale: PxScale,
}

impl TrueTypeFace {
    pub fn load<P: AsRef<Path>>(path: P, size_px: f32) -> Result<Self, PrintError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            PrintError::Font(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes, size_px)
    }

    pub fn from_bytes(bytes: Vec<u8>, size_px: f32) -> Result<Self, PrintError> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| PrintError::Font(e.to_string()))?;
        Ok(Self {
            font,
            scale: PxScale::from(size_px),
        })
    }
}

impl Typeface for TrueTypeFace {
    fn ascent(&self) -> f32 {
        self.font.as_scaled(self.scale).ascent()
    }

    fn draw_glyph(
        &self,
        ch: char,
        x: f32,
        baseline: f32,
        plot: &mut dyn FnMut(i32, i32, f32),
    ) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        let id = scaled.glyph_id(ch);
        let glyph = id.with_scale_and_position(self.scale, point(x, baseline));
        if let Some(outlined) = self.font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let (ox, oy) = (bounds.min.x as i32, bounds.min.y as i32);
            outlined.draw(|gx, gy, coverage| plot(ox + gx as i32, oy + gy as i32, coverage));
        }
        scaled.h_advance(id)
    }
}

/// Lay `text` out on a white `width × height` canvas in black, starting at the top-left.
/// Nothing wraps; ink that falls outside the canvas is dropped.
pub fn render(text: &str, face: &dyn Typeface, width: u32, height: u32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(width, height, WHITE);
    let baseline = face.ascent().ceil();
    let mut pen_x = 0.0f32;
    for ch in text.chars() {
        if pen_x >= width as f32 {
            break;
        }
        let mut plot = |px: i32, py: i32, coverage: f32| {
            if coverage < INK_THRESHOLD || px < 0 || py < 0 {
                return;
            }
            let (px, py) = (px as u32, py as u32);
            if px < width && py < height {
                canvas.put_pixel(px, py, BLACK);
            }
        };
        pen_x += face.draw_glyph(ch, pen_x, baseline, &mut plot);
    }
    canvas
}
