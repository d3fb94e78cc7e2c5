use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use super::ApiError;

/// In-memory transport for tests: replies with queued stubs in order and
/// records every request it receives.
#[derive(Default)]
pub struct StubTransport {
    stubs: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub_response(&self, status: u16, body: &str) {
        self.stubs.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn stub_transport_error(&self, reason: &str) {
        self.stubs
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Transport(reason.to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Panics if any queued stub was never requested.
    pub fn verify(&self) {
        let remaining = self.stubs.lock().unwrap().len();
        assert_eq!(remaining, 0, "{remaining} stubbed response(s) were not requested");
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let description = format!("{} {}", request.method, request.url);
        self.requests.lock().unwrap().push(request);
        self.stubs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport(format!("no stub registered for {description}"))))
    }
}
