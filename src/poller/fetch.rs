use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::ClientError;
use crate::frame::{Frame, FrameMetadata};

use super::ChannelId;

const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Still-image fetch for one channel. Any error counts as "offline".
pub trait ChannelFetcher: Send {
    fn fetch(&mut self, channel: &ChannelId) -> Result<Frame, ClientError>;
}

/// `GET <base>/<channel-id>` and decode the returned image.
pub struct HttpChannelFetcher {
    base_url: String,
    agent: ureq::Agent,
    clock: Arc<dyn Clock>,
    fetched: u64,
}

impl HttpChannelFetcher {
    pub fn new(base_url: &str, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            clock,
            fetched: 0,
        }
    }

    pub fn url_for(&self, channel: &ChannelId) -> String {
        format!("{}/{}", self.base_url, channel.as_str())
    }
}

impl ChannelFetcher for HttpChannelFetcher {
    fn fetch(&mut self, channel: &ChannelId) -> Result<Frame, ClientError> {
        let url = self.url_for(channel);
        let response = self.agent.get(&url).call()?;
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(ClientError::Status(status));
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ClientError::Transport(format!("read {}: {}", url, e)))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| ClientError::MalformedBody(format!("decode {}: {}", url, e)))?
            .into_rgb8();

        self.fetched += 1;
        let now = self.clock.now_ms();
        let metadata = FrameMetadata {
            presented_frames: self.fetched,
            presentation_time: now,
            media_time: now / 1000.0,
            width: image.width(),
            height: image.height(),
            source: channel.to_string(),
        };
        Ok(Frame::new(image, now, metadata))
    }
}
