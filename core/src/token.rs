//! Access token lifecycle.
//!
//! # Design
//! `TokenManager` owns the single `TokenState` of a client and the cached
//! secret key. The state is only ever replaced by a successful authentication;
//! a failed one leaves the previous (absent or expired) token in place.
//!
//! `ensure_fresh` holds the state lock across the refresh round trip, so
//! concurrent callers that all observe an expired token wait for one refresh
//! and then reuse its result instead of each re-authenticating.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::dispatch::RequestDispatcher;
use crate::error::{Error, Result};
use crate::parse::{ParseMode, ParsedResponse, ResponseBody};
use crate::requests;

/// Snapshot of the authentication state.
///
/// `access_token` is `None` exactly until the first successful authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: Option<String>,
    /// When the token request was sent, in epoch milliseconds.
    pub issued_at_millis: Option<i64>,
    /// Lifetime declared by the service (`expires_in`).
    pub lifetime_secs: Option<u64>,
}

impl TokenState {
    pub fn expires_at_millis(&self) -> Option<i64> {
        self.access_token.as_ref()?;
        let issued_at = self.issued_at_millis?;
        let lifetime_millis = self.lifetime_secs.unwrap_or(0).saturating_mul(1000);
        Some(issued_at.saturating_add(i64::try_from(lifetime_millis).unwrap_or(i64::MAX)))
    }

    /// A token stays valid up to and including its expiry instant.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        match self.expires_at_millis() {
            Some(expires_at) => now_millis > expires_at,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lifetime_secs")]
    expires_in: Option<u64>,
}

/// Accepts `expires_in` as an integer, a float or a numeric string.
/// Anything else counts as no declared lifetime.
fn lifetime_secs<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(whole_secs)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_secs))
        }
        _ => None,
    };
    Ok(secs)
}

fn whole_secs(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs >= 0.0).then(|| secs as u64)
}

pub struct TokenManager {
    state: Mutex<TokenState>,
    secret_key: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TokenManager {
    pub fn new(secret_key: Option<String>) -> Self {
        Self {
            state: Mutex::new(TokenState::default()),
            secret_key: Mutex::new(secret_key.filter(|key| !key.is_empty())),
        }
    }

    pub fn state(&self) -> TokenState {
        lock(&self.state).clone()
    }

    pub fn access_token(&self) -> Option<String> {
        lock(&self.state).access_token.clone()
    }

    pub fn expires_in(&self) -> Option<u64> {
        lock(&self.state).lifetime_secs
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        lock(&self.state).is_expired(now_millis)
    }

    /// Picks the key to authenticate with.
    ///
    /// An explicit key wins, then the cached one. The first key ever seen is
    /// cached for the lifetime of the manager; later explicit keys apply to
    /// their own call only.
    pub fn resolve_secret_key(&self, explicit: Option<&str>) -> Result<String> {
        let explicit = explicit.filter(|key| !key.is_empty());
        let mut cached = lock(&self.secret_key);

        if cached.is_none() {
            *cached = explicit.map(str::to_string);
        }

        explicit
            .map(str::to_string)
            .or_else(|| cached.clone())
            .ok_or(Error::MissingSecretKey)
    }

    /// Requests a new access token, replacing the current one on success.
    pub fn authenticate(
        &self,
        dispatcher: &RequestDispatcher,
        clock: &dyn Clock,
        secret_key: Option<&str>,
    ) -> Result<ParsedResponse> {
        let mut state = lock(&self.state);
        self.request_token(&mut state, dispatcher, clock, secret_key)
    }

    /// Returns a valid access token, authenticating first when there is none
    /// or it has expired.
    pub fn ensure_fresh(&self, dispatcher: &RequestDispatcher, clock: &dyn Clock) -> Result<String> {
        let mut state = lock(&self.state);

        if !state.is_expired(clock.now_millis()) {
            if let Some(token) = &state.access_token {
                return Ok(token.clone());
            }
        }

        debug!(
            authenticated = state.access_token.is_some(),
            "access token missing or expired, authenticating"
        );
        self.request_token(&mut state, dispatcher, clock, None)?;

        state.access_token.clone().ok_or(Error::MissingSecretKey)
    }

    fn request_token(
        &self,
        state: &mut TokenState,
        dispatcher: &RequestDispatcher,
        clock: &dyn Clock,
        secret_key: Option<&str>,
    ) -> Result<ParsedResponse> {
        let code = self.resolve_secret_key(secret_key)?;
        let issued_at = clock.now_millis();

        let request = requests::request_access_token(&code);
        let response = match dispatcher.dispatch(&request, ParseMode::Lenient) {
            Ok(response) => response,
            Err(Error::Api { status, body }) => {
                warn!(status, "access token request rejected");
                return Err(Error::Authentication { status, body });
            }
            Err(err) => return Err(err),
        };

        let token = match &response.body {
            ResponseBody::Json(value) => TokenResponse::deserialize(value).ok(),
            ResponseBody::Text(_) => None,
        };
        let Some(token) = token else {
            warn!(status = response.status, "access token response carries no token");
            return Err(Error::Authentication {
                status: response.status,
                body: response.body,
            });
        };

        info!(expires_in = ?token.expires_in, "access token acquired");
        *state = TokenState {
            access_token: Some(token.access_token),
            issued_at_millis: Some(issued_at),
            lifetime_secs: token.expires_in,
        };

        Ok(response)
    }
}
