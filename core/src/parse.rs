//! JSON body parsing applied to every response.
//!
//! # Design
//! Parsing has two modes. `Strict` fails the call when the body is not JSON;
//! `Lenient` keeps the raw text instead, for call sites that want a best-effort
//! body (error responses always use it so a non-JSON error page still reaches
//! the caller).

use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::HttpResponse;

/// How a response body that is not valid JSON is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Fail with `Error::Parse`.
    #[default]
    Strict,
    /// Keep the original text as `ResponseBody::Text`.
    Lenient,
}

/// A response body after the JSON step.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }

    /// Converts to a JSON value; raw text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}

/// A response whose body went through the JSON step.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// The body exactly as received.
    pub text: String,
    pub body: ResponseBody,
}

impl ParsedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_value(self) -> Value {
        self.body.into_value()
    }
}

pub fn parse_body(text: &str, mode: ParseMode) -> Result<ResponseBody> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(ResponseBody::Json(value)),
        Err(source) => match mode {
            ParseMode::Strict => Err(Error::Parse {
                source,
                text: text.to_string(),
            }),
            ParseMode::Lenient => Ok(ResponseBody::Text(text.to_string())),
        },
    }
}

pub fn parse_response(response: HttpResponse, mode: ParseMode) -> Result<ParsedResponse> {
    let body = parse_body(&response.body, mode)?;
    Ok(ParsedResponse {
        status: response.status,
        headers: response.headers,
        text: response.body,
        body,
    })
}
