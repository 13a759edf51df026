//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push_text(status, &body.to_string());
    }

    pub fn push_text(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::Transport(message.to_string())));
    }

    /// Queues a successful access token response.
    pub fn push_token(&self, token: &str, expires_in: u64) {
        self.push_json(
            200,
            serde_json::json!({"access_token": token, "expires_in": expires_in}),
        );
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests whose URL path ends with `suffix`.
    pub fn count_to(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|req| req.url.split('?').next().unwrap_or("").ends_with(suffix))
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("no scripted response left".to_string())))
    }
}

/// Decodes a form-encoded request body into pairs.
pub fn form_pairs(request: &HttpRequest) -> Vec<(String, String)> {
    serde_urlencoded::from_str(request.body.as_deref().unwrap_or("")).unwrap()
}

pub fn form_value(request: &HttpRequest, name: &str) -> Option<String> {
    form_pairs(request)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}
