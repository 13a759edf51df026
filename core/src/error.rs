//! Error types for the OpenAgenda client.
//!
//! # Design
//! Every failure surfaces to the caller unchanged; nothing is retried or
//! swallowed. `Api` and `Authentication` keep the response body (parsed as
//! JSON when possible) because the service reports field-level validation
//! problems there, and callers inspect them.

use thiserror::Error;

use crate::parse::ResponseBody;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// A 2xx response body was not valid JSON and strict parsing was requested.
    #[error("error on parsing json response")]
    Parse {
        #[source]
        source: serde_json::Error,
        text: String,
    },

    /// The request never produced a response (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("request failed: {}", describe_status(.status))]
    Api { status: u16, body: ResponseBody },

    /// The access token endpoint rejected the secret key or answered with
    /// something that is not a token.
    #[error("authentication failed: {}", describe_status(.status))]
    Authentication { status: u16, body: ResponseBody },

    /// `connect` was called without a key and none was configured.
    #[error("no secret key configured or supplied to connect")]
    MissingSecretKey,

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to encode form: {0}")]
    Encoding(#[from] serde_urlencoded::ser::Error),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl Error {
    /// HTTP status attached to the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::Authentication { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body attached to the error, if a response was received.
    pub fn response_body(&self) -> Option<&ResponseBody> {
        match self {
            Error::Api { body, .. } | Error::Authentication { body, .. } => Some(body),
            _ => None,
        }
    }
}

fn describe_status(status: &u16) -> String {
    match ureq::http::StatusCode::from_u16(*status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}
