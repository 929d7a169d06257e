use std::io::Read;
use std::time::Duration;

use crate::detect::result::DetectionResult;
use crate::error::ClientError;

const MAX_RESPONSE_BYTES: u64 = 4 * 1024 * 1024;

/// Remote detection service seam.
///
/// Exactly one call per acquired frame; the caller blocks on the outcome
/// before acquiring the next frame, so calls never overlap.
pub trait DetectionService: Send {
    /// Service identifier for logs.
    fn name(&self) -> &str;

    /// Submit an encoded image and parse the service's answer.
    fn submit(&mut self, payload: &[u8], content_type: &str)
        -> Result<DetectionResult, ClientError>;
}

/// Settings for `HttpDetectionClient`.
#[derive(Clone, Debug)]
pub struct DetectionClientConfig {
    /// Endpoint receiving `POST` requests.
    pub url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for DetectionClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/".to_string(),
            timeout: Duration::from_millis(5_000),
        }
    }
}

/// Posts encoded frames to an HTTP detection endpoint.
pub struct HttpDetectionClient {
    config: DetectionClientConfig,
    agent: ureq::Agent,
}

impl HttpDetectionClient {
    pub fn new(config: DetectionClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl DetectionService for HttpDetectionClient {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn submit(
        &mut self,
        payload: &[u8],
        content_type: &str,
    ) -> Result<DetectionResult, ClientError> {
        let response = self
            .agent
            .post(&self.config.url)
            .set("Content-Type", content_type)
            .send_bytes(payload)?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(ClientError::Status(status));
        }

        let mut body = String::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_string(&mut body)
            .map_err(|e| ClientError::Transport(format!("read response body: {}", e)))?;
        log::debug!("detection response ({}): {}", status, body);

        serde_json::from_str(&body).map_err(|e| ClientError::MalformedBody(e.to_string()))
    }
}
