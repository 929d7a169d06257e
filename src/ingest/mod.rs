//! Frame acquisition.
//!
//! This module provides the sources the camera pipeline pulls frames from:
//! - Synthetic pattern source (`stub://`, tests and demos)
//! - HTTP MJPEG / JPEG snapshot cameras (`http://`, `https://`)
//!
//! Every source implements `FrameSource` and paces itself to its target
//! frame rate. The pipeline holds exactly one pending acquisition: it only
//! asks for the next frame once the current one has been rendered.
//!
//! `MediaSession` owns the active source. Opening a new session always stops
//! the previous one first.

mod constraints;
pub mod http;
pub mod synthetic;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::AcquisitionError;
use crate::frame::Frame;

pub use constraints::{
    Constraints, DeviceCatalog, DeviceInfo, DeviceKind, FacingMode, FacingPreset, Range,
    ResolvedDevice,
};
pub use http::HttpSource;
pub use synthetic::SyntheticSource;

/// Settings handed to a source backend once a device has been resolved.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Source URL. `stub://` for synthetic frames, `http(s)://` for cameras.
    pub url: String,
    /// Target frame rate. Sources never deliver faster than this.
    pub target_fps: u32,
    /// Resolved width (synthetic sources render at this size).
    pub width: u32,
    /// Resolved height.
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 30,
            width: 1920,
            height: 1080,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// A live pixel source.
pub trait FrameSource: Send {
    /// Source identifier (usually its URL).
    fn describe(&self) -> &str;

    /// Open the underlying stream.
    fn connect(&mut self) -> Result<(), AcquisitionError>;

    /// Block until the next frame is due and return it.
    fn next_frame(&mut self) -> Result<Frame, AcquisitionError>;

    /// Tear the stream down. Must be idempotent.
    fn stop(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Build a source for `config.url` based on its scheme.
pub fn open_source(
    config: SourceConfig,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn FrameSource>, AcquisitionError> {
    if config.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config, clock)));
    }
    let url = url::Url::parse(&config.url)
        .map_err(|e| AcquisitionError::Unsupported(format!("{}: {}", config.url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(Box::new(HttpSource::new(config, clock))),
        other => Err(AcquisitionError::Unsupported(format!(
            "scheme '{}'; expected stub, http or https",
            other
        ))),
    }
}

/// The active capture stream.
pub struct MediaSession {
    device_id: String,
    constraints: Constraints,
    source: Box<dyn FrameSource>,
    stopped: bool,
}

impl MediaSession {
    /// Resolve `constraints` against the catalog, open the matching source and
    /// connect it.
    pub fn open(
        catalog: &DeviceCatalog,
        constraints: &Constraints,
        target_fps: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AcquisitionError> {
        let resolved = catalog.resolve(constraints)?;
        let source = open_source(
            SourceConfig {
                url: resolved.device.url.clone(),
                target_fps,
                width: resolved.width,
                height: resolved.height,
            },
            clock,
        )?;
        Self::with_source(resolved.device.device_id.clone(), constraints.clone(), source)
    }

    /// Start a session over an already-built source.
    pub fn with_source(
        device_id: String,
        constraints: Constraints,
        mut source: Box<dyn FrameSource>,
    ) -> Result<Self, AcquisitionError> {
        source.connect()?;
        log::info!(
            "media session started on device '{}' ({})",
            device_id,
            source.describe()
        );
        Ok(Self {
            device_id,
            constraints,
            source,
            stopped: false,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn next_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.stopped {
            return Err(AcquisitionError::StreamEnded);
        }
        self.source.next_frame()
    }

    pub fn stats(&self) -> SourceStats {
        self.source.stats()
    }

    pub fn is_healthy(&self) -> bool {
        !self.stopped && self.source.is_healthy()
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.source.stop();
        self.stopped = true;
        log::info!(
            "media session on device '{}' stopped after {} frames",
            self.device_id,
            self.source.stats().frames_captured
        );
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Holds a source to its target frame rate.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    next_due_ms: Option<f64>,
}

impl Pacer {
    pub(crate) fn new(target_fps: u32) -> Self {
        Self {
            interval: frame_interval(target_fps),
            next_due_ms: None,
        }
    }

    /// Sleep until the next frame slot and claim it. Returns the slot time.
    pub(crate) fn wait(&mut self, clock: &dyn Clock) -> f64 {
        if let Some(due) = self.next_due_ms {
            let now = clock.now_ms();
            if now < due {
                clock.sleep(Duration::from_secs_f64((due - now) / 1000.0));
            }
        }
        self.claim(clock.now_ms())
    }

    /// True when a frame arriving at `now_ms` may be delivered.
    pub(crate) fn is_due(&self, now_ms: f64) -> bool {
        self.next_due_ms.map_or(true, |due| now_ms >= due)
    }

    pub(crate) fn claim(&mut self, now_ms: f64) -> f64 {
        self.next_due_ms = Some(now_ms + self.interval.as_secs_f64() * 1000.0);
        now_ms
    }

    pub(crate) fn reset(&mut self) {
        self.next_due_ms = None;
    }
}

pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn pacer_sleeps_only_when_ahead_of_schedule() {
        let clock = ManualClock::new();
        let mut pacer = Pacer::new(10);

        assert_eq!(pacer.wait(&clock), 0.0);
        assert_eq!(pacer.wait(&clock), 100.0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(pacer.wait(&clock), 350.0);

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
    }

    #[test]
    fn pacer_decimates_early_frames() {
        let mut pacer = Pacer::new(5);
        assert!(pacer.is_due(0.0));
        pacer.claim(0.0);
        assert!(!pacer.is_due(150.0));
        assert!(pacer.is_due(200.0));
    }

    #[test]
    fn open_source_rejects_unknown_scheme() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let config = SourceConfig {
            url: "rtsp://camera/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            open_source(config, clock),
            Err(AcquisitionError::Unsupported(_))
        ));
    }
}
