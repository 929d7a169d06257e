//! Frames flowing through one pipeline iteration.
//!
//! - `Frame`: RGB raster plus capture timestamp and metadata. Owned by the
//!   iteration that acquired it.
//! - `FrameMetadata`: per-frame record shown in the metadata readout.

use image::RgbImage;
use serde::Serialize;

/// Per-frame information reported alongside the pixels.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetadata {
    /// Frames presented by the source since it connected.
    pub presented_frames: u64,
    /// Time the frame was handed to the pipeline (ms, source clock).
    pub presentation_time: f64,
    /// Position in the media timeline (seconds since connect).
    pub media_time: f64,
    pub width: u32,
    pub height: u32,
    /// Source URL or channel id.
    pub source: String,
}

/// A decoded frame.
///
/// Not `Clone`: a frame belongs to one iteration and is dropped once it has
/// been encoded and drawn.
#[derive(Debug)]
pub struct Frame {
    image: RgbImage,
    timestamp_ms: f64,
    metadata: FrameMetadata,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp_ms: f64, metadata: FrameMetadata) -> Self {
        Self {
            image,
            timestamp_ms,
            metadata,
        }
    }

    /// Wrap raw RGB bytes. Returns `None` when the length does not match.
    pub fn from_rgb(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        timestamp_ms: f64,
        metadata: FrameMetadata,
    ) -> Option<Self> {
        RgbImage::from_raw(width, height, pixels)
            .map(|image| Self::new(image, timestamp_ms, metadata))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}
