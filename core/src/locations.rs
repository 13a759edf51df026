//! Location operations.

use std::fmt::Display;

use serde_json::Value;

use crate::client::OpenAgenda;
use crate::error::Result;
use crate::parse::ParseMode;
use crate::requests;

#[derive(Debug, Clone, Copy)]
pub struct Locations<'a> {
    sdk: &'a OpenAgenda,
}

impl<'a> Locations<'a> {
    pub(crate) fn new(sdk: &'a OpenAgenda) -> Self {
        Self { sdk }
    }

    /// Creates a location attached to `agenda_uid`.
    ///
    /// `data` must be a JSON object (`name`, `address`, `latitude`,
    /// `longitude`, ...). Returns the created location.
    pub fn create(&self, agenda_uid: impl Display, data: &Value) -> Result<Value> {
        let token = self.sdk.refresh_token()?;
        let request = requests::create_location(agenda_uid, &token, requests::nonce(), data)?;
        Ok(self
            .sdk
            .dispatcher()
            .dispatch(&request, ParseMode::Strict)?
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use crate::testing::{form_value, ScriptedTransport};

    fn connected() -> (OpenAgenda, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let config = Config::default()
            .with_base_url("http://mock")
            .with_secret_key("secret");
        let oa = OpenAgenda::builder(config).transport(transport.clone()).build();
        transport.push_token("tok", 3600);
        oa.connect().unwrap();
        (oa, transport)
    }

    #[test]
    fn create_posts_location_with_agenda_uid() {
        let (oa, transport) = connected();
        transport.push_json(200, json!({"uid": 123, "name": "Gare Meuse TGV"}));

        let location = oa
            .locations()
            .create(
                7,
                &json!({
                    "name": "Gare Meuse TGV",
                    "latitude": 48.9736458,
                    "longitude": 5.2723537
                }),
            )
            .unwrap();
        assert!(location["uid"].is_u64());

        let request = transport.requests().pop().unwrap();
        assert_eq!(request.url, "http://mock/v1/locations");
        let data: Value = serde_json::from_str(&form_value(&request, "data").unwrap()).unwrap();
        assert_eq!(data["agenda_uid"], 7);
        assert_eq!(data["latitude"], 48.9736458);
    }

    #[test]
    fn service_error_body_is_kept() {
        let (oa, transport) = connected();
        let body = json!({
            "error": "invalid_request",
            "error_description": "latitude: Latitude is required, longitude: Longitude is required"
        });
        transport.push_json(400, body.clone());

        let err = oa
            .locations()
            .create(7, &json!({"name": "Gare Meuse TGV"}))
            .unwrap_err();
        assert_eq!(err.response_body().and_then(|b| b.as_json()), Some(&body));
    }

    #[test]
    fn non_object_payload_is_rejected_before_sending() {
        let (oa, transport) = connected();
        let err = oa.locations().create(7, &json!("Gare")).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert_eq!(transport.requests().len(), 1);
    }
}
