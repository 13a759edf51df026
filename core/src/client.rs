//! Top-level client for the OpenAgenda API.
//!
//! # Design
//! `OpenAgenda` owns everything with state: the configuration, the dispatcher
//! (and through it the shared HTTP transport), the clock and the token
//! manager. Resource clients returned by `events()` and `locations()` borrow
//! it; they read the current token through `refresh_token` and never touch
//! the token state themselves.

use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatch::RequestDispatcher;
use crate::error::Result;
use crate::events::Events;
use crate::http::{Transport, UreqTransport};
use crate::locations::Locations;
use crate::parse::ParsedResponse;
use crate::token::{TokenManager, TokenState};

/// Blocking client for the OpenAgenda API.
///
/// `Send + Sync`: share it behind an `Arc` to issue calls from several threads.
pub struct OpenAgenda {
    config: Config,
    dispatcher: RequestDispatcher,
    clock: Arc<dyn Clock>,
    tokens: TokenManager,
}

impl OpenAgenda {
    /// Client over the ureq transport and the system clock.
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> OpenAgendaBuilder {
        OpenAgendaBuilder {
            config,
            transport: None,
            clock: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Authenticates with the configured secret key.
    pub fn connect(&self) -> Result<ParsedResponse> {
        self.tokens
            .authenticate(&self.dispatcher, self.clock.as_ref(), None)
    }

    /// Authenticates with `secret_key`.
    ///
    /// When no key was configured, the first key passed here is kept and used
    /// for every later implicit refresh.
    pub fn connect_with(&self, secret_key: &str) -> Result<ParsedResponse> {
        self.tokens
            .authenticate(&self.dispatcher, self.clock.as_ref(), Some(secret_key))
    }

    /// Returns a valid access token, re-authenticating if there is none yet or
    /// the current one has expired.
    pub fn refresh_token(&self) -> Result<String> {
        self.tokens
            .ensure_fresh(&self.dispatcher, self.clock.as_ref())
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.access_token()
    }

    /// Lifetime in seconds declared with the current token.
    pub fn expires_in(&self) -> Option<u64> {
        self.tokens.expires_in()
    }

    pub fn token_state(&self) -> TokenState {
        self.tokens.state()
    }

    pub fn token_is_expired(&self) -> bool {
        self.tokens.is_expired(self.clock.now_millis())
    }

    pub fn events(&self) -> Events<'_> {
        Events::new(self)
    }

    pub fn locations(&self) -> Locations<'_> {
        Locations::new(self)
    }

    pub(crate) fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }
}

impl fmt::Debug for OpenAgenda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAgenda")
            .field("base_url", &self.dispatcher.base_url())
            .field("authenticated", &self.tokens.access_token().is_some())
            .finish_non_exhaustive()
    }
}

/// Swaps the transport or clock of an `OpenAgenda` before it is built.
pub struct OpenAgendaBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl OpenAgendaBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> OpenAgenda {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(UreqTransport::new(self.config.timeout())),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        OpenAgenda {
            dispatcher: RequestDispatcher::new(&self.config.base_url, transport),
            tokens: TokenManager::new(self.config.secret_key.clone()),
            clock,
            config: self.config,
        }
    }
}
