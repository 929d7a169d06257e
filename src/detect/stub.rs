use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::detect::client::DetectionService;
use crate::detect::result::DetectionResult;
use crate::error::ClientError;

/// In-process service for `stub://` endpoints. Always answers with an empty
/// detection list.
#[derive(Debug, Default)]
pub struct StubDetectionService {
    requests: u64,
}

impl StubDetectionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }
}

impl DetectionService for StubDetectionService {
    fn name(&self) -> &str {
        "stub"
    }

    fn submit(
        &mut self,
        _payload: &[u8],
        _content_type: &str,
    ) -> Result<DetectionResult, ClientError> {
        self.requests += 1;
        Ok(DetectionResult::default())
    }
}

/// A request seen by `ScriptedDetectionService`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub content_type: String,
    pub payload_len: usize,
}

/// Shared view of the requests a `ScriptedDetectionService` received. Stays
/// readable after the service was boxed into a pipeline.
#[derive(Clone, Debug, Default)]
pub struct RequestLog(Arc<Mutex<Vec<RecordedRequest>>>);

impl RequestLog {
    pub fn entries(&self) -> Vec<RecordedRequest> {
        self.0
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, request: RecordedRequest) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(request);
        }
    }
}

/// Replays queued outcomes in order; once the queue is empty every request
/// gets an empty result.
#[derive(Debug, Default)]
pub struct ScriptedDetectionService {
    outcomes: VecDeque<Result<DetectionResult, ClientError>>,
    requests: RequestLog,
}

impl ScriptedDetectionService {
    pub fn new(outcomes: Vec<Result<DetectionResult, ClientError>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            requests: RequestLog::default(),
        }
    }

    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }
}

impl DetectionService for ScriptedDetectionService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn submit(
        &mut self,
        payload: &[u8],
        content_type: &str,
    ) -> Result<DetectionResult, ClientError> {
        self.requests.push(RecordedRequest {
            content_type: content_type.to_string(),
            payload_len: payload.len(),
        });
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| Ok(DetectionResult::default()))
    }
}
