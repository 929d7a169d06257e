//! Display surfaces the overlay renderer draws on.

use ab_glyph::{FontArc, PxScale};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::frame::Frame;

/// Box in surface pixels. `x`/`y` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Colors and sizes used for annotations.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayStyle {
    pub stroke: [u8; 3],
    pub line_width: u32,
    pub text: [u8; 3],
    pub font_px: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke: [0xFF, 0xFF, 0x00],
            line_width: 2,
            text: [0x00, 0x00, 0xFF],
            font_px: 20.0,
        }
    }
}

/// Drawing target.
///
/// `draw_frame` always covers the whole surface, which is how stale
/// annotations from the previous iteration disappear.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Draw `frame` scaled to the full surface.
    fn draw_frame(&mut self, frame: &Frame);

    fn stroke_rect(&mut self, rect: PixelRect, style: &OverlayStyle);

    /// Draw `text` with its baseline at (`x`, `y`).
    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &OverlayStyle);

    /// Replace the content with a transparent placeholder.
    fn clear(&mut self);
}

/// RGBA raster surface drawn with `imageproc`.
///
/// Labels need a TrueType font; without one a solid label tab is drawn in
/// the text color instead of glyphs.
pub struct RasterSurface {
    canvas: RgbaImage,
    font: Option<FontArc>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            font: None,
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Load a TrueType/OpenType font for labels.
    pub fn load_font(path: &std::path::Path) -> anyhow::Result<FontArc> {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read font {}: {}", path.display(), e))?;
        FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("invalid font {}: {}", path.display(), e))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    /// True while the surface has no pixels, e.g. before the first frame of
    /// a session sized it.
    pub fn is_empty(&self) -> bool {
        let (width, height) = self.canvas.dimensions();
        width == 0 || height == 0
    }

    pub fn save_png(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.canvas
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))
    }

    /// Write the surface unless it is still empty. Returns whether a file was
    /// written.
    pub fn save_png_if_drawn(&self, path: &std::path::Path) -> anyhow::Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        self.save_png(path)?;
        Ok(true)
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbaImage::new(width, height);
        }
    }

    fn draw_frame(&mut self, frame: &Frame) {
        let (width, height) = self.canvas.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let rgba = image::DynamicImage::ImageRgb8(frame.image().clone()).into_rgba8();
        self.canvas = if rgba.dimensions() == (width, height) {
            rgba
        } else {
            imageops::resize(&rgba, width, height, FilterType::Triangle)
        };
    }

    fn stroke_rect(&mut self, rect: PixelRect, style: &OverlayStyle) {
        let color = Rgba([style.stroke[0], style.stroke[1], style.stroke[2], 0xFF]);
        let x = rect.x.round() as i32;
        let y = rect.y.round() as i32;
        let width = rect.width.round().max(1.0) as u32;
        let height = rect.height.round().max(1.0) as u32;
        // Grow outward one pixel per extra line width.
        for inset in 0..style.line_width.max(1) as i32 {
            let w = width + 2 * inset as u32;
            let h = height + 2 * inset as u32;
            draw_hollow_rect_mut(
                &mut self.canvas,
                Rect::at(x - inset, y - inset).of_size(w, h),
                color,
            );
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &OverlayStyle) {
        if text.is_empty() {
            return;
        }
        let color = Rgba([style.text[0], style.text[1], style.text[2], 0xFF]);
        let top = (y - style.font_px).max(0.0).round() as i32;
        let left = x.round() as i32;
        match &self.font {
            Some(font) => {
                draw_text_mut(
                    &mut self.canvas,
                    color,
                    left,
                    top,
                    PxScale::from(style.font_px),
                    font,
                    text,
                );
            }
            None => {
                let width = (text.chars().count() as f32 * style.font_px * 0.6).max(1.0) as u32;
                let height = style.font_px.max(1.0) as u32;
                draw_filled_rect_mut(
                    &mut self.canvas,
                    Rect::at(left, top).of_size(width, height),
                    color,
                );
            }
        }
    }

    fn clear(&mut self) {
        let (width, height) = self.canvas.dimensions();
        self.canvas = RgbaImage::new(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameMetadata;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::from_rgb(
            width,
            height,
            vec![value; (width * height * 3) as usize],
            0.0,
            FrameMetadata::default(),
        )
        .unwrap()
    }

    #[test]
    fn draw_frame_scales_to_surface() {
        let mut surface = RasterSurface::new(8, 6);
        surface.draw_frame(&solid_frame(16, 12, 200));
        assert_eq!(surface.image().dimensions(), (8, 6));
        let pixel = surface.image().get_pixel(4, 3);
        assert!(pixel.0[..3].iter().all(|&c| c.abs_diff(200) <= 1));
        assert_eq!(pixel.0[3], 255);
    }

    #[test]
    fn stroke_rect_outlines_box() {
        let mut surface = RasterSurface::new(20, 20);
        surface.draw_frame(&solid_frame(20, 20, 0));
        let style = OverlayStyle {
            line_width: 1,
            ..OverlayStyle::default()
        };
        surface.stroke_rect(
            PixelRect {
                x: 5.0,
                y: 5.0,
                width: 10.0,
                height: 10.0,
            },
            &style,
        );
        assert_eq!(surface.image().get_pixel(5, 5), &Rgba([255, 255, 0, 255]));
        assert_eq!(surface.image().get_pixel(14, 10), &Rgba([255, 255, 0, 255]));
        assert_eq!(surface.image().get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn empty_surface_is_not_written() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("last.png");

        let empty = RasterSurface::new(0, 0);
        assert!(empty.is_empty());
        assert!(!empty.save_png_if_drawn(&path)?);
        assert!(!path.exists());

        let mut drawn = RasterSurface::new(0, 0);
        drawn.resize(4, 3);
        drawn.draw_frame(&solid_frame(4, 3, 50));
        assert!(drawn.save_png_if_drawn(&path)?);
        assert_eq!(image::image_dimensions(&path)?, (4, 3));
        Ok(())
    }

    #[test]
    fn clear_leaves_transparent_surface() {
        let mut surface = RasterSurface::new(4, 4);
        surface.draw_frame(&solid_frame(4, 4, 90));
        surface.clear();
        assert_eq!(surface.image().get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }
}
