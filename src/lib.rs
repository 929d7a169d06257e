//! Live monitoring client.
//!
//! Two independent loops share the same rendering path:
//!
//! - the camera pipeline: acquire a frame, snapshot it, post it to an HTTP
//!   object-detection service and draw the returned boxes over the frame
//! - the channel dashboard: poll a still image per selected channel, show it,
//!   and track each channel's reachability with a fixed retry backoff
//!
//! # Module Structure
//!
//! - `ingest`: frame sources, device constraints and the media session
//! - `snapshot`: frame → JPEG/PNG bytes
//! - `detect`: detection service client and response types
//! - `render`: drawing surfaces and the overlay renderer
//! - `pipeline`: the camera detection loop
//! - `poller`: the channel poller, health store and its worker thread
//! - `config`: layered configuration (file, environment)

pub mod clock;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod poller;
pub mod render;
pub mod snapshot;

pub use clock::{Clock, ManualClock, StreamClock, SystemClock};
pub use config::MonitorConfig;
pub use detect::{Detection, DetectionResult, DetectionService, HttpDetectionClient};
pub use error::{AcquisitionError, ClientError, EncodingError};
pub use frame::{Frame, FrameMetadata};
pub use ingest::{Constraints, DeviceCatalog, FacingMode, FacingPreset, FrameSource, MediaSession};
pub use pipeline::{CameraPipeline, IterationReport, PipelineCommand, PipelineSettings};
pub use poller::{
    ChannelFetcher, ChannelHealth, ChannelHealthStore, ChannelId, ChannelPoller, PollPolicy,
    PollerHandle,
};
pub use render::{Overlay, OverlayRenderer, RasterSurface, RecordingSurface, Surface};
pub use snapshot::SnapshotFormat;
