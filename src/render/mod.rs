//! Overlay rendering.
//!
//! `OverlayRenderer` owns the display surface and the FPS / metadata
//! readouts. Nothing else mutates them. Every render pass:
//! 1. draws the base frame over the whole surface
//! 2. strokes the detection boxes, scaled by the surface's current size
//! 3. ticks the stream clock and refreshes both readouts

mod layout;
mod recording;
mod surface;

pub use layout::fit_frame;
pub use recording::{DrawOp, RecordingSurface};
pub use surface::{OverlayStyle, PixelRect, RasterSurface, Surface};

use crate::clock::StreamClock;
use crate::detect::{Detection, DetectionResult};
use crate::frame::{Frame, FrameMetadata};

/// What to draw over the base frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    /// The detection service answered.
    Detections(DetectionResult),
    /// Encoding or the request failed; base frame only.
    Failed,
    /// Nothing to annotate.
    Plain,
}

/// Text readouts next to the surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Readouts {
    pub fps: f64,
    pub fps_text: String,
    pub metadata_text: String,
}

impl Readouts {
    fn update(&mut self, fps: f64, metadata: &FrameMetadata) {
        self.fps = fps;
        self.fps_text = if fps == 0.0 {
            "0".to_string()
        } else {
            format!("{:.3}", fps)
        };
        self.metadata_text = serde_json::to_string_pretty(metadata).unwrap_or_default();
    }
}

/// Summary of one render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderReport {
    pub boxes_drawn: usize,
    pub fps: f64,
}

/// Scale a frame-relative detection to surface pixels.
pub fn pixel_rect(detection: &Detection, surface_width: u32, surface_height: u32) -> PixelRect {
    let width = surface_width as f32;
    let height = surface_height as f32;
    PixelRect {
        x: detection.x * width,
        y: detection.y * height,
        width: detection.width * width,
        height: detection.height * height,
    }
}

pub struct OverlayRenderer<S: Surface> {
    surface: S,
    style: OverlayStyle,
    clock: StreamClock,
    readouts: Readouts,
}

impl<S: Surface> OverlayRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self::with_style(surface, OverlayStyle::default())
    }

    pub fn with_style(surface: S, style: OverlayStyle) -> Self {
        Self {
            surface,
            style,
            clock: StreamClock::new(),
            readouts: Readouts::default(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    pub fn readouts(&self) -> &Readouts {
        &self.readouts
    }

    pub fn stream_clock(&self) -> &StreamClock {
        &self.clock
    }

    /// Start a new stream session: the FPS estimate starts over.
    pub fn reset_clock(&mut self) {
        self.clock.reset();
    }

    /// Match the surface to a new source's native size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    pub fn render(&mut self, frame: &Frame, overlay: &Overlay) -> RenderReport {
        self.surface.draw_frame(frame);

        let mut boxes_drawn = 0;
        if let Overlay::Detections(result) = overlay {
            if result.is_error() {
                log::warn!(
                    "detection service reported error_code {:?}; drawing frame only",
                    result.error_code
                );
            } else {
                let (width, height) = self.surface.size();
                for detection in &result.detections {
                    let rect = pixel_rect(detection, width, height);
                    self.surface.stroke_rect(rect, &self.style);
                    self.surface
                        .fill_text(&detection.label(), rect.x, rect.y, &self.style);
                    log::debug!(
                        "class {} ({:.2}) at {:.0},{:.0} {:.0}x{:.0}",
                        detection.class,
                        detection.confidence,
                        rect.x,
                        rect.y,
                        rect.width,
                        rect.height
                    );
                    boxes_drawn += 1;
                }
            }
        }

        let fps = self.clock.tick(frame.timestamp_ms());
        self.readouts.update(fps, frame.metadata());
        RenderReport { boxes_drawn, fps }
    }

    /// Show the transparent placeholder used for unreachable channels.
    pub fn render_placeholder(&mut self) {
        self.surface.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_at(timestamp_ms: f64) -> Frame {
        Frame::from_rgb(
            4,
            4,
            vec![0u8; 48],
            timestamp_ms,
            FrameMetadata {
                presented_frames: 1,
                width: 4,
                height: 4,
                source: "stub://test".to_string(),
                ..FrameMetadata::default()
            },
        )
        .unwrap()
    }

    fn detection(class: i64, x: f32, y: f32, width: f32, height: f32) -> Detection {
        Detection {
            class,
            x,
            y,
            width,
            height,
            confidence: 0.9,
        }
    }

    #[test]
    fn empty_detections_draw_frame_only() {
        let mut renderer = OverlayRenderer::new(RecordingSurface::new(640, 480));
        let overlay = Overlay::Detections(DetectionResult::default());
        let report = renderer.render(&frame_at(0.0), &overlay);
        assert_eq!(report.boxes_drawn, 0);
        assert_eq!(renderer.surface().frames_drawn(), 1);
        assert!(renderer.surface().rects().is_empty());
        assert!(renderer.surface().texts().is_empty());
    }

    #[test]
    fn box_scales_with_current_surface_size() {
        let mut renderer = OverlayRenderer::new(RecordingSurface::new(640, 480));
        let result = DetectionResult {
            error_code: None,
            detections: vec![detection(2, 0.1, 0.1, 0.2, 0.2)],
        };
        renderer.render(&frame_at(0.0), &Overlay::Detections(result.clone()));
        let rect = renderer.surface().rects()[0];
        assert!((rect.x - 64.0).abs() < 1e-3);
        assert!((rect.y - 48.0).abs() < 1e-3);
        assert!((rect.right() - 192.0).abs() < 1e-3);
        assert!((rect.bottom() - 144.0).abs() < 1e-3);
        assert_eq!(renderer.surface().texts(), vec!["2".to_string()]);

        renderer.surface_mut().take_ops();
        renderer.resize(1280, 720);
        renderer.render(&frame_at(40.0), &Overlay::Detections(result));
        let rect = renderer.surface().rects()[0];
        assert!((rect.x - 128.0).abs() < 1e-3);
        assert!((rect.y - 72.0).abs() < 1e-3);
    }

    #[test]
    fn failures_and_error_codes_draw_no_annotations() {
        let mut renderer = OverlayRenderer::new(RecordingSurface::new(100, 100));
        renderer.render(&frame_at(0.0), &Overlay::Failed);
        renderer.render(
            &frame_at(10.0),
            &Overlay::Detections(DetectionResult {
                error_code: Some(7),
                detections: vec![detection(1, 0.0, 0.0, 1.0, 1.0)],
            }),
        );
        assert_eq!(renderer.surface().frames_drawn(), 2);
        assert!(renderer.surface().rects().is_empty());
    }

    #[test]
    fn detections_are_drawn_in_response_order() {
        let mut renderer = OverlayRenderer::new(RecordingSurface::new(100, 100));
        let result = DetectionResult {
            error_code: Some(0),
            detections: vec![
                detection(5, 0.5, 0.5, 0.1, 0.1),
                detection(3, 0.0, 0.0, 0.1, 0.1),
            ],
        };
        renderer.render(&frame_at(0.0), &Overlay::Detections(result));
        assert_eq!(renderer.surface().texts(), vec!["5", "3"]);
    }

    #[test]
    fn fps_readout_is_zero_on_first_frame() {
        let mut renderer = OverlayRenderer::new(RecordingSurface::new(10, 10));
        let report = renderer.render(&frame_at(500.0), &Overlay::Plain);
        assert_eq!(report.fps, 0.0);
        assert_eq!(renderer.readouts().fps_text, "0");

        renderer.render(&frame_at(1500.0), &Overlay::Plain);
        assert_eq!(renderer.readouts().fps_text, "2.000");
        assert!(renderer.readouts().metadata_text.contains("\"source\": \"stub://test\""));
    }

    #[test]
    fn reset_clock_starts_new_session() {
        let mut renderer = OverlayRenderer::new(RecordingSurface::new(10, 10));
        renderer.render(&frame_at(0.0), &Overlay::Plain);
        renderer.render(&frame_at(100.0), &Overlay::Plain);
        renderer.reset_clock();
        assert_eq!(renderer.stream_clock().frame_count(), 0);
        assert_eq!(renderer.stream_clock().start_time(), None);
    }
}
