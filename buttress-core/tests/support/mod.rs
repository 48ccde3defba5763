//! Shared test doubles for the orchestration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use buttress_core::{
    CallEvent, EventKind, MetricsSink, ServiceRequest, ServiceResponse, Transport, TransportError,
};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted transport behavior, consumed per attempt.
#[derive(Debug, Clone)]
pub enum Step {
    /// Respond immediately with this status.
    Respond(u16),
    /// Respond immediately with this status and body.
    RespondWith(u16, &'static str),
    /// Fail with a transport error.
    Fail(TransportError),
    /// Respond with this status after a delay.
    RespondAfter(u16, Duration),
}

/// Transport double that replays a script and counts invocations.
pub struct MockTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// Replay `steps` in order; panic if an attempt outruns the script.
    pub fn scripted(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Replay `steps`, then keep answering with `fallback`.
    pub fn scripted_then(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            fallback: Some(fallback),
            calls: AtomicUsize::new(0),
        })
    }

    /// Answer every attempt the same way.
    pub fn always(step: Step) -> Arc<Self> {
        Self::scripted_then([], step)
    }

    /// Transport invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        _request: &ServiceRequest,
    ) -> Result<ServiceResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.script.lock();
            script
                .pop_front()
                .or_else(|| self.fallback.clone())
                .expect("mock transport script exhausted")
        };
        match step {
            Step::Respond(status) => Ok(response(status, "")),
            Step::RespondWith(status, body) => Ok(response(status, body)),
            Step::Fail(error) => Err(error),
            Step::RespondAfter(status, delay) => {
                tokio::time::sleep(delay).await;
                Ok(response(status, ""))
            }
        }
    }
}

/// Build a bare response with the given status and body.
pub fn response(status: u16, body: &'static str) -> ServiceResponse {
    ServiceResponse::new(
        StatusCode::from_u16(status).expect("valid status"),
        HeaderMap::new(),
        Bytes::from_static(body.as_bytes()),
    )
}

/// Metrics sink that remembers every event.
#[derive(Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<CallEvent>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All recorded events, in emission order.
    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }

    /// Number of events of one kind.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }
}

impl MetricsSink for RecordingMetrics {
    fn record(&self, event: &CallEvent) {
        self.events.lock().push(event.clone());
    }
}
