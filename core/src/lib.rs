//! Blocking client for the OpenAgenda event publishing API.
//!
//! # Overview
//! `OpenAgenda` authenticates with a secret key, keeps the access token fresh
//! and maps event and location operations onto form-encoded HTTP requests,
//! returning parsed JSON or a structured `Error`.
//!
//! # Design
//! - `TokenManager` is the only stateful piece: every resource call goes
//!   through `ensure_fresh`, which re-authenticates once the declared token
//!   lifetime has elapsed.
//! - `requests` builds each operation as plain data; `RequestDispatcher`
//!   applies the base URL, executes it through a `Transport` and runs the
//!   JSON step on the body.
//! - The transport and the clock are traits so tests can script responses and
//!   move time forward.
//! - Payloads are `serde_json::Value`; the service validates fields and
//!   reports problems in error bodies, exposed via `Error::response_body`.

pub mod client;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod http;
pub mod locations;
pub mod parse;
pub mod requests;
pub mod token;

#[cfg(test)]
mod testing;

pub use client::{OpenAgenda, OpenAgendaBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, DEFAULT_BASE_URL};
pub use dispatch::{ApiRequest, RequestDispatcher};
pub use error::{Error, Result};
pub use events::Events;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use locations::Locations;
pub use parse::{parse_body, parse_response, ParseMode, ParsedResponse, ResponseBody};
pub use token::{TokenManager, TokenState};
