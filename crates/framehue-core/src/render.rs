use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::color::AverageColor;
use crate::video::frame::Frame;

const TEXT_SCALE: f32 = 28.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_LINE_HEIGHT: i32 = 30;
const BORDER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Swatch edge as a fraction of the frame's shorter side.
const SWATCH_FRACTION: u32 = 6;
const SWATCH_MARGIN: u32 = 10;

/// Draws the average color as a swatch in the bottom-right corner, plus a caption
/// when a font is available, and saves the result as PNG.
pub struct SwatchRenderer {
    font: Option<FontVec>,
}

impl SwatchRenderer {
    /// Without a font only the swatch is drawn.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(Self::load_font);
        Self { font }
    }

    pub fn render(&self, frame: &Frame, index: u64, average: &AverageColor) -> Result<RgbImage> {
        let mut img = frame
            .to_rgb_image()
            .context("frame cannot be converted to an image")?;

        let (w, h) = img.dimensions();
        let side = (w.min(h) / SWATCH_FRACTION).max(1);
        let margin = SWATCH_MARGIN.min(w.saturating_sub(side)).min(h.saturating_sub(side));
        let x = w - side - margin;
        let y = h - side - margin;

        let rect = Rect::at(x as i32, y as i32).of_size(side, side);
        draw_filled_rect_mut(&mut img, rect, average.to_rgb8());
        if side > 2 {
            draw_hollow_rect_mut(&mut img, rect, BORDER_COLOR);
        }

        self.draw_caption(&mut img, index, average);
        Ok(img)
    }

    /// Render and write `frame_{index:08}.png` into `dir`.
    pub fn save_frame(
        &self,
        frame: &Frame,
        index: u64,
        average: &AverageColor,
        dir: &Path,
    ) -> Result<PathBuf> {
        let path = dir.join(format!("frame_{index:08}.png"));
        self.save_frame_to(frame, index, average, &path)?;
        Ok(path)
    }

    pub fn save_frame_to(
        &self,
        frame: &Frame,
        index: u64,
        average: &AverageColor,
        path: &Path,
    ) -> Result<()> {
        let img = self.render(frame, index, average)?;
        img.save(path)
            .with_context(|| format!("failed to save frame to {}", path.display()))?;

        debug!(?path, index, "saved frame");
        Ok(())
    }

    fn draw_caption(&self, img: &mut RgbImage, index: u64, average: &AverageColor) {
        let Some(font) = &self.font else { return };
        let scale = PxScale::from(TEXT_SCALE);
        let x = 10;
        let y = 10;

        let header = format!("F:{index}");
        draw_text_mut(img, TEXT_COLOR, x, y, scale, font, &header);

        let avg_text = format!("RGB {average}");
        draw_text_mut(img, TEXT_COLOR, x, y + TEXT_LINE_HEIGHT, scale, font, &avg_text);
    }

    fn load_font(path: &Path) -> Option<FontVec> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(?path, error = %e, "failed to read font file");
                return None;
            }
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!(?path, "loaded caption font");
                Some(font)
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to parse font file");
                None
            }
        }
    }
}
