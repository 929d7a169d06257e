mod client;
mod result;
mod stub;

pub use client::{DetectionClientConfig, DetectionService, HttpDetectionClient};
pub use result::{Detection, DetectionResult};
pub use stub::{RecordedRequest, RequestLog, ScriptedDetectionService, StubDetectionService};

/// Build the service for `config.url`: `stub://` endpoints resolve to the
/// in-process stub, anything else is posted to over HTTP.
pub fn service_for(config: DetectionClientConfig) -> Box<dyn DetectionService> {
    if config.url.starts_with("stub://") {
        Box::new(StubDetectionService::new())
    } else {
        Box::new(HttpDetectionClient::new(config))
    }
}
