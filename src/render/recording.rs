use super::surface::{OverlayStyle, PixelRect, Surface};
use crate::frame::Frame;

/// One call made against a `RecordingSurface`.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Resize { width: u32, height: u32 },
    Frame { width: u32, height: u32 },
    Rect(PixelRect),
    Text { text: String, x: f32, y: f32 },
    Clear,
}

/// Surface that records draw calls instead of rasterizing. Used for headless
/// runs and for asserting what the renderer drew.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn frames_drawn(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Frame { .. }))
            .count()
    }

    pub fn rects(&self) -> Vec<PixelRect> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect(rect) => Some(*rect),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.ops.push(DrawOp::Resize { width, height });
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.ops.push(DrawOp::Frame {
            width: frame.width(),
            height: frame.height(),
        });
    }

    fn stroke_rect(&mut self, rect: PixelRect, _style: &OverlayStyle) {
        self.ops.push(DrawOp::Rect(rect));
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, _style: &OverlayStyle) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }
}
