//! The one-request contract shared by every operation.
//!
//! # Design
//! `ApiRequest` describes an operation relative to the API root (verb, path,
//! query, form or JSON body). `RequestDispatcher::build` turns it into an
//! absolute `HttpRequest` without I/O; `dispatch` additionally executes it
//! through the transport and runs the JSON step on whatever comes back.
//! Error responses are parsed too: the service describes rejected fields in
//! the body of 4xx responses.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::parse::{parse_response, ParseMode, ParsedResponse};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An operation against the API, before the base URL is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    /// Overrides the default `accept: application/json`.
    pub accept: Option<String>,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            accept: None,
            query: Vec::new(),
            form: Vec::new(),
            json: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Value of a form field, if present.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Sends `ApiRequest`s against one base URL through a shared transport.
#[derive(Clone)]
pub struct RequestDispatcher {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl RequestDispatcher {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build(&self, request: &ApiRequest) -> Result<HttpRequest> {
        let mut url = format!("{}{}", self.base_url, request.path);
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&serde_urlencoded::to_string(&request.query)?);
        }

        let accept = request
            .accept
            .clone()
            .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string());
        let mut headers = vec![("accept".to_string(), accept)];

        let body = match (&request.json, request.form.is_empty()) {
            (Some(_), false) => {
                return Err(Error::InvalidPayload(
                    "a request carries either form fields or a JSON body, not both".to_string(),
                ))
            }
            (Some(json), true) => {
                headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
                Some(serde_json::to_string(json)?)
            }
            (None, false) => {
                headers.push(("content-type".to_string(), FORM_CONTENT_TYPE.to_string()));
                Some(serde_urlencoded::to_string(&request.form)?)
            }
            (None, true) => None,
        };

        Ok(HttpRequest {
            method: request.method,
            url,
            headers,
            body,
        })
    }

    /// Performs exactly one HTTP call.
    ///
    /// Non-2xx responses become `Error::Api` with a leniently parsed body;
    /// 2xx bodies are parsed with `mode`.
    pub fn dispatch(&self, request: &ApiRequest, mode: ParseMode) -> Result<ParsedResponse> {
        let http_request = self.build(request)?;
        debug!(method = %request.method, path = %request.path, "dispatching request");

        let response = self.transport.execute(http_request)?;
        debug!(status = response.status, path = %request.path, "response received");

        if !response.is_success() {
            let parsed = parse_response(response, ParseMode::Lenient)?;
            return Err(Error::Api {
                status: parsed.status,
                body: parsed.body,
            });
        }

        parse_response(response, mode)
    }
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::parse::ResponseBody;
    use crate::testing::ScriptedTransport;

    fn dispatcher(transport: &Arc<ScriptedTransport>) -> RequestDispatcher {
        RequestDispatcher::new("http://localhost:3000/", transport.clone())
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let transport = Arc::new(ScriptedTransport::new());
        let req = dispatcher(&transport)
            .build(&ApiRequest::get("/v1/events/1"))
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/v1/events/1");
    }

    #[test]
    fn build_defaults_accept_to_json() {
        let transport = Arc::new(ScriptedTransport::new());
        let req = dispatcher(&transport)
            .build(&ApiRequest::get("/v1/events/1"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.headers, vec![("accept".to_string(), "application/json".to_string())]);
        assert!(req.body.is_none());
    }

    #[test]
    fn accept_can_be_overridden() {
        let transport = Arc::new(ScriptedTransport::new());
        let req = dispatcher(&transport)
            .build(&ApiRequest::get("/feed").accept("text/plain"))
            .unwrap();
        assert_eq!(req.header("accept"), Some("text/plain"));
    }

    #[test]
    fn query_is_url_encoded() {
        let transport = Arc::new(ScriptedTransport::new());
        let req = dispatcher(&transport)
            .build(&ApiRequest::get("/v1/events/9").query("key", "a b&c"))
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/v1/events/9?key=a+b%26c");
    }

    #[test]
    fn form_body_is_url_encoded() {
        let transport = Arc::new(ScriptedTransport::new());
        let req = dispatcher(&transport)
            .build(
                &ApiRequest::post("/v1/requestAccessToken")
                    .form("grant-type", "authorization_code")
                    .form("code", "k=1"),
            )
            .unwrap();
        assert_eq!(req.header("content-type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(
            req.body.as_deref(),
            Some("grant-type=authorization_code&code=k%3D1")
        );
    }

    #[test]
    fn json_body_is_serialized() {
        let transport = Arc::new(ScriptedTransport::new());
        let req = dispatcher(&transport)
            .build(&ApiRequest::post("/things").json(json!({"a": 1})))
            .unwrap();
        assert_eq!(req.header("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(req.body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn form_and_json_together_are_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = dispatcher(&transport)
            .build(&ApiRequest::post("/x").form("a", "1").json(json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn dispatch_parses_success_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"success": true}));
        let parsed = dispatcher(&transport)
            .dispatch(&ApiRequest::get("/v1/events/1"), ParseMode::Strict)
            .unwrap();
        assert_eq!(parsed.body, ResponseBody::Json(json!({"success": true})));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn dispatch_exposes_error_body() {
        let transport = Arc::new(ScriptedTransport::new());
        let body = json!({"errors": [{"field": "title", "code": "required"}]});
        transport.push_json(400, body.clone());
        let err = dispatcher(&transport)
            .dispatch(&ApiRequest::post("/v2/agendas/1/events"), ParseMode::Strict)
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.response_body().and_then(ResponseBody::as_json), Some(&body));
    }

    #[test]
    fn dispatch_keeps_non_json_error_body_as_text() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text(502, "Bad Gateway");
        let err = dispatcher(&transport)
            .dispatch(&ApiRequest::get("/v1/events/1"), ParseMode::Strict)
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 502, .. }));
        assert_eq!(err.response_body().and_then(ResponseBody::as_text), Some("Bad Gateway"));
    }

    #[test]
    fn dispatch_honours_parse_mode_on_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text(200, "ok");
        transport.push_text(200, "ok");
        let dispatcher = dispatcher(&transport);
        let request = ApiRequest::get("/health");

        let err = dispatcher.dispatch(&request, ParseMode::Strict).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));

        let parsed = dispatcher.dispatch(&request, ParseMode::Lenient).unwrap();
        assert_eq!(parsed.body.as_text(), Some("ok"));
    }

    #[test]
    fn transport_failure_propagates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_error("connection refused");
        let err = dispatcher(&transport)
            .dispatch(&ApiRequest::get("/v1/events/1"), ParseMode::Strict)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg == "connection refused"));
    }
}
