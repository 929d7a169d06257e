//! Frame snapshots for the detection request.
//!
//! The snapshot is taken at the display surface's *current* size, so the
//! detector sees exactly the raster the overlay is later drawn over.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::ImageFormat;

use crate::error::EncodingError;
use crate::frame::Frame;

/// Payload encodings the detection endpoint accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SnapshotFormat {
    #[default]
    Jpeg,
    Png,
}

impl SnapshotFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            SnapshotFormat::Jpeg => "image/jpeg",
            SnapshotFormat::Png => "image/png",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            SnapshotFormat::Jpeg => ImageFormat::Jpeg,
            SnapshotFormat::Png => ImageFormat::Png,
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = EncodingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "jpeg" | "jpg" => Ok(SnapshotFormat::Jpeg),
            "image/png" | "png" => Ok(SnapshotFormat::Png),
            other => Err(EncodingError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Encoded request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: SnapshotFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Resize `frame` to `target_width`x`target_height` and encode it.
pub fn encode(
    frame: &Frame,
    target_width: u32,
    target_height: u32,
    format: SnapshotFormat,
) -> Result<EncodedImage, EncodingError> {
    if target_width == 0 || target_height == 0 || frame.width() == 0 || frame.height() == 0 {
        return Err(EncodingError::EmptySurface {
            width: target_width,
            height: target_height,
        });
    }

    let mut bytes = Vec::new();
    let source = frame.image();
    if (source.width(), source.height()) == (target_width, target_height) {
        source.write_to(&mut Cursor::new(&mut bytes), format.image_format())?;
    } else {
        let resized = imageops::resize(source, target_width, target_height, FilterType::Triangle);
        resized.write_to(&mut Cursor::new(&mut bytes), format.image_format())?;
    }

    Ok(EncodedImage {
        bytes,
        format,
        width: target_width,
        height: target_height,
    })
}
