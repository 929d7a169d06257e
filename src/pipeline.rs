//! Camera detection pipeline.
//!
//! One iteration: acquire a frame → snapshot it at the surface's current size
//! → post it to the detection service → render the frame and any boxes. The
//! next frame is only acquired after the render step finished, so at most
//! one request is ever outstanding.
//!
//! Encoding and request failures are recovered inside the iteration (the base
//! frame is still drawn). Acquisition failures are fatal for the stream: the
//! session is torn down and the error returned to the caller.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use crate::clock::Clock;
use crate::detect::DetectionService;
use crate::error::AcquisitionError;
use crate::ingest::{Constraints, DeviceCatalog, FrameSource, MediaSession};
use crate::render::{Overlay, OverlayRenderer, Surface};
use crate::snapshot::{self, SnapshotFormat};

/// Lifecycle requests from the controls. Applied between iterations only.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineCommand {
    /// Open a (new) source; any current one is stopped first.
    Start(Constraints),
    Pause,
    Resume,
    /// Tear the session down and leave `run`.
    Stop,
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Pacing for camera sources.
    pub target_fps: u32,
    /// Snapshot encoding sent to the detection service.
    pub format: SnapshotFormat,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_fps: 30,
            format: SnapshotFormat::Jpeg,
        }
    }
}

/// How the detection request of an iteration went.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    Answered,
    EncodeFailed,
    RequestFailed,
}

/// Summary of one completed iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationReport {
    pub status: RequestStatus,
    pub boxes_drawn: usize,
    pub fps: f64,
    pub frame_timestamp_ms: f64,
}

pub struct CameraPipeline<S: Surface> {
    catalog: DeviceCatalog,
    settings: PipelineSettings,
    clock: Arc<dyn Clock>,
    detector: Box<dyn DetectionService>,
    renderer: OverlayRenderer<S>,
    session: Option<MediaSession>,
    paused: bool,
    /// Resize the surface to the first frame of a new session.
    fit_surface: bool,
}

impl<S: Surface> CameraPipeline<S> {
    pub fn new(
        catalog: DeviceCatalog,
        settings: PipelineSettings,
        clock: Arc<dyn Clock>,
        detector: Box<dyn DetectionService>,
        renderer: OverlayRenderer<S>,
    ) -> Self {
        Self {
            catalog,
            settings,
            clock,
            detector,
            renderer,
            session: None,
            paused: false,
            fit_surface: false,
        }
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn renderer(&self) -> &OverlayRenderer<S> {
        &self.renderer
    }

    pub fn detector(&self) -> &dyn DetectionService {
        self.detector.as_ref()
    }

    pub fn session(&self) -> Option<&MediaSession> {
        self.session.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some() && !self.paused
    }

    /// Open the device matching `constraints`, replacing any current session.
    pub fn start(&mut self, constraints: &Constraints) -> Result<(), AcquisitionError> {
        self.stop();
        let session = MediaSession::open(
            &self.catalog,
            constraints,
            self.settings.target_fps,
            self.clock.clone(),
        )?;
        self.attach(session);
        Ok(())
    }

    /// Start a session over a caller-built source.
    pub fn start_with_source(
        &mut self,
        device_id: &str,
        source: Box<dyn FrameSource>,
    ) -> Result<(), AcquisitionError> {
        self.stop();
        let session =
            MediaSession::with_source(device_id.to_string(), Constraints::default(), source)?;
        self.attach(session);
        Ok(())
    }

    fn attach(&mut self, session: MediaSession) {
        self.renderer.reset_clock();
        self.session = Some(session);
        self.paused = false;
        self.fit_surface = true;
    }

    pub fn pause(&mut self) {
        if self.session.is_some() && !self.paused {
            self.paused = true;
            log::info!("camera pipeline paused");
        }
    }

    pub fn resume(&mut self) {
        if self.session.is_some() && self.paused {
            self.paused = false;
            log::info!("camera pipeline resumed");
        }
    }

    /// Tear down the current session. The stream clock restarts with the
    /// next session.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            self.renderer.reset_clock();
        }
        self.paused = false;
    }

    /// Run one iteration. Returns `Ok(None)` when paused or not started.
    pub fn step(&mut self) -> Result<Option<IterationReport>, AcquisitionError> {
        if self.paused {
            return Ok(None);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        let frame = match session.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!(
                    "acquisition failed on device '{}': {}",
                    session.device_id(),
                    err
                );
                self.stop();
                return Err(err);
            }
        };

        if self.fit_surface {
            self.renderer.resize(frame.width(), frame.height());
            self.fit_surface = false;
        }

        let (width, height) = self.renderer.surface_size();
        let (overlay, status) = match snapshot::encode(&frame, width, height, self.settings.format)
        {
            Ok(encoded) => match self.detector.submit(&encoded.bytes, encoded.content_type()) {
                Ok(result) => (Overlay::Detections(result), RequestStatus::Answered),
                Err(err) => {
                    log::warn!("detection request to {} failed: {}", self.detector.name(), err);
                    (Overlay::Failed, RequestStatus::RequestFailed)
                }
            },
            Err(err) => {
                log::warn!("snapshot encoding failed: {}", err);
                (Overlay::Failed, RequestStatus::EncodeFailed)
            }
        };

        let report = self.renderer.render(&frame, &overlay);
        log::debug!(
            "frame at {:.1}ms: {:?}, {} boxes, fps {}",
            frame.timestamp_ms(),
            status,
            report.boxes_drawn,
            self.renderer.readouts().fps_text
        );
        Ok(Some(IterationReport {
            status,
            boxes_drawn: report.boxes_drawn,
            fps: report.fps,
            frame_timestamp_ms: frame.timestamp_ms(),
        }))
    }

    /// Drive the pipeline until `Stop`, until the command channel closes while
    /// idle, or until `max_frames` frames were rendered. Returns the number of
    /// rendered frames.
    pub fn run(
        &mut self,
        commands: &Receiver<PipelineCommand>,
        max_frames: Option<u64>,
    ) -> Result<u64, AcquisitionError> {
        let mut rendered = 0u64;
        loop {
            loop {
                let command = if self.is_running() {
                    match commands.try_recv() {
                        Ok(command) => command,
                        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                    }
                } else {
                    match commands.recv() {
                        Ok(command) => command,
                        Err(_) => {
                            self.stop();
                            return Ok(rendered);
                        }
                    }
                };
                match command {
                    PipelineCommand::Start(constraints) => self.start(&constraints)?,
                    PipelineCommand::Pause => self.pause(),
                    PipelineCommand::Resume => self.resume(),
                    PipelineCommand::Stop => {
                        self.stop();
                        return Ok(rendered);
                    }
                }
            }

            if self.step()?.is_some() {
                rendered += 1;
                if max_frames.is_some_and(|max| rendered >= max) {
                    self.stop();
                    return Ok(rendered);
                }
            }
        }
    }
}
