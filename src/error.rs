//! Error taxonomy for the monitoring pipelines.
//!
//! - `AcquisitionError` is fatal for the stream that raised it.
//! - `EncodingError` and `ClientError` are recovered inside the iteration that
//!   raised them: the base frame is still rendered and the pipeline re-arms.
//!
//! Channel poll failures are not errors at this level; they surface only as
//! health changes.

use thiserror::Error;

/// The frame source could not be opened or stopped producing frames.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no video input satisfies the requested constraints: {0}")]
    Overconstrained(String),
    #[error("unsupported source '{0}'")]
    Unsupported(String),
    #[error("source not connected; call connect() first")]
    NotConnected,
    #[error("stream ended")]
    StreamEnded,
    #[error("source failure: {0}")]
    Source(String),
}

/// A frame could not be turned into a request payload.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("cannot encode a {width}x{height} surface")]
    EmptySurface { width: u32, height: u32 },
    #[error("unsupported snapshot format '{0}'")]
    UnsupportedFormat(String),
    #[error("encoder failure: {0}")]
    Encoder(#[from] image::ImageError),
}

/// A network round-trip did not yield a usable response.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl From<ureq::Error> for ClientError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => ClientError::Status(code),
            ureq::Error::Transport(transport) => ClientError::Transport(transport.to_string()),
        }
    }
}
