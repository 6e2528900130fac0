//! Scripted in-process transport double.
//!
//! Records every dispatch and replays canned responses, so composition
//! behaviour can be asserted without a network.
#![allow(dead_code)] // included per test binary; not every binary uses every helper

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use routekit::{Descriptor, Method, Response, RouteError, Transport};

/// Route composition logs through the `log` facade; opt in per test run
/// with `RUST_LOG=debug`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One recorded dispatch.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub url: String,
    pub descriptor: Descriptor,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentRequest>>>,
    responses: Arc<Mutex<Vec<Response>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; replayed in FIFO order. With the queue empty a
    /// bare 200 with an empty body is returned.
    pub fn push_response(&self, response: Response) {
        self.responses.lock().expect("lock responses").push(response);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().expect("lock sent").clone()
    }

    pub fn last_sent(&self) -> SentRequest {
        self.sent()
            .last()
            .cloned()
            .expect("at least one request sent")
    }
}

/// Build a JSON response for queuing on the mock.
pub fn json_response(status: u16, body: &str) -> Response {
    Response::new(
        status,
        "https://api.test/",
        vec![(
            "content-type".to_string(),
            "application/json".to_string(),
        )],
        body.as_bytes().to_vec(),
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        descriptor: &Descriptor,
    ) -> Result<Response, RouteError> {
        self.sent.lock().expect("lock sent").push(SentRequest {
            method,
            url: url.to_string(),
            descriptor: descriptor.clone(),
        });
        let mut responses = self.responses.lock().expect("lock responses");
        if responses.is_empty() {
            Ok(Response::new(200, url, Vec::new(), Vec::new()))
        } else {
            Ok(responses.remove(0))
        }
    }
}
