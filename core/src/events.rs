//! Event operations.

use std::fmt::Display;

use serde_json::Value;

use crate::client::OpenAgenda;
use crate::dispatch::ApiRequest;
use crate::error::Result;
use crate::parse::ParseMode;
use crate::requests;

/// Event operations of an `OpenAgenda` client.
///
/// Every call refreshes the access token first when needed.
#[derive(Debug, Clone, Copy)]
pub struct Events<'a> {
    sdk: &'a OpenAgenda,
}

impl<'a> Events<'a> {
    pub(crate) fn new(sdk: &'a OpenAgenda) -> Self {
        Self { sdk }
    }

    /// Fetches one event and returns the `data` member of the response
    /// (`Null` when absent).
    ///
    /// The service may return the uid as a string here even when it was
    /// created as a number.
    pub fn get(&self, event_uid: impl Display) -> Result<Value> {
        self.sdk.refresh_token()?;

        let request = requests::get_event(event_uid, self.sdk.config().public_key.as_deref());
        let body = self
            .sdk
            .dispatcher()
            .dispatch(&request, ParseMode::Strict)?
            .into_value();

        Ok(match body {
            Value::Object(mut fields) => fields.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        })
    }

    /// Creates an event in an agenda. Returns the response body, which holds
    /// `success` and the created `event`.
    pub fn create(&self, agenda_uid: impl Display, data: &Value) -> Result<Value> {
        let token = self.sdk.refresh_token()?;
        let request = requests::create_event(agenda_uid, &token, requests::nonce(), data)?;
        self.send(&request)
    }

    pub fn update(
        &self,
        agenda_uid: impl Display,
        event_uid: impl Display,
        data: &Value,
    ) -> Result<Value> {
        let token = self.sdk.refresh_token()?;
        let request =
            requests::update_event(agenda_uid, event_uid, &token, requests::nonce(), data)?;
        self.send(&request)
    }

    pub fn delete(&self, agenda_uid: impl Display, event_uid: impl Display) -> Result<Value> {
        let token = self.sdk.refresh_token()?;
        let request = requests::delete_event(agenda_uid, event_uid, &token, requests::nonce());
        self.send(&request)
    }

    fn send(&self, request: &ApiRequest) -> Result<Value> {
        Ok(self
            .sdk
            .dispatcher()
            .dispatch(request, ParseMode::Strict)?
            .into_value())
    }
}
