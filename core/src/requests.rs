//! Request shapes for every API operation.
//!
//! Pure constructors: the access token and nonce are passed in, so the exact
//! request an operation produces can be checked without a network or a clock.

use std::fmt::Display;

use rand::Rng;
use serde_json::Value;

use crate::dispatch::ApiRequest;
use crate::error::{Error, Result};

pub const ACCESS_TOKEN_PATH: &str = "/v1/requestAccessToken";

/// Nonces are drawn from `[0, NONCE_BOUND)`.
pub const NONCE_BOUND: u32 = 1_000_000;

/// A fresh random nonce for a mutating request.
pub fn nonce() -> u32 {
    rand::rng().random_range(0..NONCE_BOUND)
}

pub fn request_access_token(secret_key: &str) -> ApiRequest {
    ApiRequest::post(ACCESS_TOKEN_PATH)
        .form("grant-type", "authorization_code")
        .form("code", secret_key)
}

/// `key` is omitted when no public key is configured.
pub fn get_event(event_uid: impl Display, public_key: Option<&str>) -> ApiRequest {
    let request = ApiRequest::get(format!("/v1/events/{}", segment(event_uid)));
    match public_key {
        Some(key) => request.query("key", key),
        None => request,
    }
}

pub fn create_event(
    agenda_uid: impl Display,
    access_token: &str,
    nonce: u32,
    data: &Value,
) -> Result<ApiRequest> {
    let request = ApiRequest::post(format!("/v2/agendas/{}/events", segment(agenda_uid)));
    Ok(signed(request, access_token, nonce).form("data", serde_json::to_string(data)?))
}

pub fn update_event(
    agenda_uid: impl Display,
    event_uid: impl Display,
    access_token: &str,
    nonce: u32,
    data: &Value,
) -> Result<ApiRequest> {
    let request = ApiRequest::post(event_path(agenda_uid, event_uid));
    Ok(signed(request, access_token, nonce).form("data", serde_json::to_string(data)?))
}

pub fn delete_event(
    agenda_uid: impl Display,
    event_uid: impl Display,
    access_token: &str,
    nonce: u32,
) -> ApiRequest {
    let request = ApiRequest::delete(event_path(agenda_uid, event_uid));
    signed(request, access_token, nonce)
}

/// `data` must be a JSON object; `agenda_uid` is injected into it.
pub fn create_location(
    agenda_uid: impl Display,
    access_token: &str,
    nonce: u32,
    data: &Value,
) -> Result<ApiRequest> {
    let Value::Object(fields) = data else {
        return Err(Error::InvalidPayload(
            "location data must be a JSON object".to_string(),
        ));
    };

    let mut fields = fields.clone();
    fields.insert("agenda_uid".to_string(), uid_value(&agenda_uid.to_string()));

    let request = ApiRequest::post("/v1/locations");
    Ok(signed(request, access_token, nonce)
        .form("data", serde_json::to_string(&Value::Object(fields))?))
}

fn event_path(agenda_uid: impl Display, event_uid: impl Display) -> String {
    format!(
        "/v2/agendas/{}/events/{}",
        segment(agenda_uid),
        segment(event_uid)
    )
}

/// Percent-encodes a uid as a single path segment.
///
/// Dot segments are encoded too, so a uid can never climb out of its path.
fn segment(uid: impl Display) -> String {
    let encoded = urlencoding::encode(&uid.to_string()).into_owned();
    if encoded.chars().all(|c| c == '.') {
        encoded.replace('.', "%2E")
    } else {
        encoded
    }
}

fn signed(request: ApiRequest, access_token: &str, nonce: u32) -> ApiRequest {
    request
        .form("access_token", access_token)
        .form("nonce", nonce.to_string())
}

/// Numeric uids stay numbers inside JSON payloads.
fn uid_value(uid: &str) -> Value {
    uid.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(uid.to_string()))
}
