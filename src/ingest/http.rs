//! HTTP camera source.
//!
//! Connects to an `http(s)://` camera endpoint and decodes JPEG frames
//! in-memory. Two stream shapes are supported, chosen from the response
//! content type at connect time:
//! - `multipart/x-mixed-replace` MJPEG streams, decimated to the target rate
//! - single-image endpoints, re-fetched once per frame slot

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use image::GenericImageView;

use super::{FrameSource, Pacer, SourceConfig, SourceStats};
use crate::clock::Clock;
use crate::error::AcquisitionError;
use crate::frame::{Frame, FrameMetadata};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpSource {
    config: SourceConfig,
    clock: Arc<dyn Clock>,
    agent: ureq::Agent,
    pacer: Pacer,
    stream: Option<HttpStream>,
    connected_at_ms: Option<f64>,
    last_frame_at_ms: Option<f64>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpSource {
    pub fn new(config: SourceConfig, clock: Arc<dyn Clock>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        let pacer = Pacer::new(config.target_fps);
        Self {
            config,
            clock,
            agent,
            pacer,
            stream: None,
            connected_at_ms: None,
            last_frame_at_ms: None,
            frame_count: 0,
        }
    }

    fn fetch_snapshot(&self) -> Result<Vec<u8>, AcquisitionError> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .map_err(|e| source_error("fetch snapshot", &self.config.url, e))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_JPEG_BYTES as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| source_error("read snapshot", &self.config.url, e))?;
        if bytes.is_empty() {
            return Err(AcquisitionError::Source(format!(
                "empty snapshot from {}",
                self.config.url
            )));
        }
        Ok(bytes)
    }

    fn build_frame(&mut self, jpeg_bytes: &[u8], now: f64) -> Result<Frame, AcquisitionError> {
        let image = image::load_from_memory(jpeg_bytes)
            .map_err(|e| source_error("decode frame", &self.config.url, e))?;
        let (width, height) = image.dimensions();
        self.frame_count += 1;
        self.last_frame_at_ms = Some(now);

        let connected_at = self.connected_at_ms.unwrap_or(now);
        let metadata = FrameMetadata {
            presented_frames: self.frame_count,
            presentation_time: now,
            media_time: (now - connected_at) / 1000.0,
            width,
            height,
            source: self.config.url.clone(),
        };
        Ok(Frame::new(image.into_rgb8(), now, metadata))
    }
}

impl FrameSource for HttpSource {
    fn describe(&self) -> &str {
        &self.config.url
    }

    fn connect(&mut self) -> Result<(), AcquisitionError> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .map_err(|e| source_error("connect", &self.config.url, e))?;
        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        self.stream = if content_type.contains("multipart") {
            Some(HttpStream::Mjpeg(MjpegStream::new(response.into_reader())))
        } else {
            Some(HttpStream::Snapshot)
        };
        self.connected_at_ms = Some(self.clock.now_ms());
        self.pacer.reset();
        log::info!(
            "HttpSource: connected to {} ({})",
            self.config.url,
            if content_type.contains("multipart") {
                "mjpeg"
            } else {
                "snapshot"
            }
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.stream.is_none() {
            return Err(AcquisitionError::NotConnected);
        }
        loop {
            let is_mjpeg = matches!(self.stream, Some(HttpStream::Mjpeg(_)));
            let (jpeg_bytes, now) = if is_mjpeg {
                let bytes = match self.stream.as_mut() {
                    Some(HttpStream::Mjpeg(stream)) => stream.read_next_jpeg()?,
                    _ => return Err(AcquisitionError::NotConnected),
                };
                let now = self.clock.now_ms();
                if !self.pacer.is_due(now) {
                    continue;
                }
                (bytes, self.pacer.claim(now))
            } else {
                let now = self.pacer.wait(self.clock.as_ref());
                (self.fetch_snapshot()?, now)
            };
            return self.build_frame(&jpeg_bytes, now);
        }
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            self.connected_at_ms = None;
            log::info!("HttpSource: closed {}", self.config.url);
        }
    }

    fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at_ms else {
            return false;
        };
        let now = self.clock.now_ms();
        match self.last_frame_at_ms {
            Some(last) => now - last <= health_grace_ms(self.config.target_fps),
            None => now - connected_at <= CONNECT_TIMEOUT.as_secs_f64() * 1000.0,
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self
                .reader
                .read(&mut chunk)
                .map_err(|e| AcquisitionError::Source(format!("read mjpeg chunk: {}", e)))?;
            if read == 0 {
                return Err(AcquisitionError::StreamEnded);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Locate the first complete JPEG (SOI..EOI) in `buffer`.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

fn health_grace_ms(target_fps: u32) -> f64 {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    base_ms.max(2_000) as f64
}

fn source_error(action: &str, url: &str, err: impl std::fmt::Display) -> AcquisitionError {
    AcquisitionError::Source(format!("{} {}: {}", action, url, err))
}
