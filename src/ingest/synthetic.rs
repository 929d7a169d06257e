//! Synthetic frame source for `stub://` URLs.
//!
//! Produces a moving gradient with a little sensor noise at the configured
//! size, paced to the target frame rate. Used by tests and by the binaries
//! when no real camera is configured.

use std::sync::Arc;

use rand::Rng;

use super::{FrameSource, Pacer, SourceConfig, SourceStats};
use crate::clock::Clock;
use crate::error::AcquisitionError;
use crate::frame::{Frame, FrameMetadata};

pub struct SyntheticSource {
    config: SourceConfig,
    clock: Arc<dyn Clock>,
    pacer: Pacer,
    connected_at_ms: Option<f64>,
    frame_count: u64,
    /// Simulated scene state; changes every 50 frames.
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig, clock: Arc<dyn Clock>) -> Self {
        let pacer = Pacer::new(config.target_fps);
        Self {
            config,
            clock,
            pacer,
            connected_at_ms: None,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let shift = self.frame_count as usize + self.scene_state as usize;
        let mut rng = rand::thread_rng();
        let mut pixels = vec![0u8; width * height * 3];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = i % width;
            let y = i / width;
            let noise: u8 = rng.gen_range(0..4);
            px[0] = ((x + shift) % 256) as u8 ^ noise;
            px[1] = ((y + shift) % 256) as u8;
            px[2] = self.scene_state.wrapping_mul(40);
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> &str {
        &self.config.url
    }

    fn connect(&mut self) -> Result<(), AcquisitionError> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(AcquisitionError::Source(format!(
                "synthetic source {} has zero size",
                self.config.url
            )));
        }
        self.connected_at_ms = Some(self.clock.now_ms());
        self.pacer.reset();
        log::info!("SyntheticSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, AcquisitionError> {
        let connected_at = self
            .connected_at_ms
            .ok_or(AcquisitionError::NotConnected)?;
        let now = self.pacer.wait(self.clock.as_ref());
        let pixels = self.generate_pixels();
        self.frame_count += 1;

        let metadata = FrameMetadata {
            presented_frames: self.frame_count,
            presentation_time: now,
            media_time: (now - connected_at) / 1000.0,
            width: self.config.width,
            height: self.config.height,
            source: self.config.url.clone(),
        };
        Frame::from_rgb(self.config.width, self.config.height, pixels, now, metadata)
            .ok_or_else(|| AcquisitionError::Source("synthetic frame size mismatch".to_string()))
    }

    fn stop(&mut self) {
        if self.connected_at_ms.take().is_some() {
            log::info!("SyntheticSource: stopped {}", self.config.url);
        }
    }

    fn is_healthy(&self) -> bool {
        self.connected_at_ms.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn stub_config() -> SourceConfig {
        SourceConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_source_produces_paced_frames() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::new());
        let mut source = SyntheticSource::new(stub_config(), clock.clone());
        source.connect()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_eq!((first.width(), first.height()), (64, 48));
        assert_eq!(second.timestamp_ms() - first.timestamp_ms(), 100.0);
        assert_eq!(second.metadata().presented_frames, 2);
        assert_eq!(source.stats().frames_captured, 2);

        Ok(())
    }

    #[test]
    fn synthetic_source_requires_connect() {
        let clock = Arc::new(ManualClock::new());
        let mut source = SyntheticSource::new(stub_config(), clock);
        assert!(matches!(
            source.next_frame(),
            Err(AcquisitionError::NotConnected)
        ));
    }

    #[test]
    fn stopped_source_is_unhealthy() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::new());
        let mut source = SyntheticSource::new(stub_config(), clock);
        source.connect()?;
        assert!(source.is_healthy());
        source.stop();
        source.stop();
        assert!(!source.is_healthy());
        Ok(())
    }
}
