//! Client configuration.
//!
//! Deserializes with camelCase keys (`baseUrl`, `publicKey`, `secretKey`,
//! `timeoutSecs`; `baseURL` is accepted too) so it can sit inside a host's own
//! configuration file. Missing fields fall back to `Config::default()`.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openagenda.com";

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    #[serde(alias = "baseURL")]
    pub base_url: String,
    /// Sent as `key` when reading events.
    pub public_key: Option<String>,
    /// Exchanged for an access token. May instead be given to the first
    /// `connect_with` call.
    pub secret_key: Option<String>,
    /// Whole-request timeout. Unset means the HTTP client's defaults.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            public_key: None,
            secret_key: None,
            timeout_secs: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    /// Reads `OPENAGENDA_BASE_URL`, `OPENAGENDA_PUBLIC_KEY`,
    /// `OPENAGENDA_SECRET_KEY` and `OPENAGENDA_TIMEOUT_SECS` over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    /// Empty values count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Self {
            base_url: var("OPENAGENDA_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            public_key: var("OPENAGENDA_PUBLIC_KEY"),
            secret_key: var("OPENAGENDA_SECRET_KEY"),
            timeout_secs: var("OPENAGENDA_TIMEOUT_SECS").and_then(|s| s.parse().ok()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
