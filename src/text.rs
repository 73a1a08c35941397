use std::path::Path;

use ab_glyph::{Font as _, FontVec, Glyph, PxScale, ScaleFont as _, point};
use anyhow::Context as _;

use crate::{
    canvas::{Canvas, PremulRgba8},
    error::{NetreelError, NetreelResult},
};

/// The rasterizer's text seam: measuring and drawing one line of text.
/// `origin` is the left end of the baseline. Brushes are shared across
/// render workers, hence `Sync`.
pub trait TextBrush: Sync {
    fn measure(&self, text: &str, size_px: f64) -> f64;
    fn line_height(&self, size_px: f64) -> f64;
    fn draw(&self, canvas: &mut Canvas, text: &str, size_px: f64, origin: kurbo::Point, color: PremulRgba8);
}

/// Glyph-outline brush over a loaded TrueType/OpenType font.
#[derive(Debug)]
pub struct FontBrush {
    font: FontVec,
}

const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

impl FontBrush {
    pub fn from_bytes(bytes: Vec<u8>) -> NetreelResult<Self> {
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| NetreelError::render(format!("invalid font data: {e}")))?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> NetreelResult<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        Self::from_bytes(bytes)
    }

    /// Look for a usable sans-serif font in the usual system locations.
    pub fn discover() -> Option<Self> {
        for candidate in FONT_SEARCH_PATHS {
            let path = Path::new(candidate);
            if path.exists()
                && let Ok(brush) = Self::from_path(path)
            {
                tracing::debug!(font = %path.display(), "discovered label font");
                return Some(brush);
            }
        }
        None
    }
}

impl TextBrush for FontBrush {
    fn measure(&self, text: &str, size_px: f64) -> f64 {
        let scaled = self.font.as_scaled(PxScale::from(size_px as f32));
        let mut width = 0.0f32;
        let mut prev = None;
        for ch in text.chars() {
            let id = scaled.scaled_glyph(ch).id;
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        f64::from(width)
    }

    fn line_height(&self, size_px: f64) -> f64 {
        let scaled = self.font.as_scaled(PxScale::from(size_px as f32));
        f64::from(scaled.ascent() - scaled.descent())
    }

    fn draw(&self, canvas: &mut Canvas, text: &str, size_px: f64, origin: kurbo::Point, color: PremulRgba8) {
        let scaled = self.font.as_scaled(PxScale::from(size_px as f32));
        let mut caret = origin.x as f32;
        let baseline = origin.y as f32;
        let mut prev = None;
        for ch in text.chars() {
            let mut glyph: Glyph = scaled.scaled_glyph(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, glyph.id);
            }
            glyph.position = point(caret, baseline);
            caret += scaled.h_advance(glyph.id);
            prev = Some(glyph.id);

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let x = bounds.min.x as i64 + i64::from(gx);
                    let y = bounds.min.y as i64 + i64::from(gy);
                    canvas.over_px(x, y, color, f64::from(coverage));
                });
            }
        }
    }
}

/// Deterministic brush with a fixed advance per character. Used by tests
/// and available as a degraded fallback when no font can be loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedAdvanceBrush;

impl FixedAdvanceBrush {
    const ADVANCE: f64 = 0.6;
    const ASCENT: f64 = 0.74;
}

impl TextBrush for FixedAdvanceBrush {
    fn measure(&self, text: &str, size_px: f64) -> f64 {
        text.chars().count() as f64 * size_px * Self::ADVANCE
    }

    fn line_height(&self, size_px: f64) -> f64 {
        size_px
    }

    fn draw(&self, canvas: &mut Canvas, text: &str, size_px: f64, origin: kurbo::Point, color: PremulRgba8) {
        let width = self.measure(text, size_px);
        let x0 = origin.x.floor() as i64;
        let x1 = (origin.x + width).ceil() as i64;
        let y0 = (origin.y - size_px * Self::ASCENT).floor() as i64;
        let y1 = origin.y.ceil() as i64;
        for y in y0..y1 {
            for x in x0..x1 {
                canvas.over_px(x, y, color, 1.0);
            }
        }
    }
}
