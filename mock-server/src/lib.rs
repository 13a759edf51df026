use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Credentials and token lifetime the mock accepts and hands out.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub secret_key: String,
    pub public_key: String,
    pub expires_in: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            secret_key: "mock-secret-key".to_string(),
            public_key: "mock-public-key".to_string(),
            expires_in: 3600,
        }
    }
}

impl MockConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            secret_key: std::env::var("MOCK_SECRET_KEY").unwrap_or(defaults.secret_key),
            public_key: std::env::var("MOCK_PUBLIC_KEY").unwrap_or(defaults.public_key),
            expires_in: std::env::var("MOCK_EXPIRES_IN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.expires_in),
        }
    }
}

#[derive(Debug)]
pub struct Store {
    tokens: HashSet<String>,
    events: HashMap<u64, StoredEvent>,
    locations: HashMap<u64, Value>,
    next_uid: u64,
}

#[derive(Debug, Clone)]
struct StoredEvent {
    agenda_uid: String,
    fields: Map<String, Value>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            tokens: HashSet::new(),
            events: HashMap::new(),
            locations: HashMap::new(),
            next_uid: 10_000_000,
        }
    }
}

impl Store {
    fn next_uid(&mut self) -> u64 {
        self.next_uid += 1;
        self.next_uid
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<MockConfig>,
    pub db: Db,
    token_requests: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(RwLock::new(Store::default())),
            token_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of access token requests received, successful or not.
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }
}

type Reply = (StatusCode, Json<Value>);
type Fields = HashMap<String, String>;

pub fn app() -> Router {
    router(AppState::new(MockConfig::default()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/requestAccessToken", post(request_access_token))
        .route("/v1/events/{uid}", get(get_event))
        .route("/v2/agendas/{agenda_uid}/events", post(create_event))
        .route(
            "/v2/agendas/{agenda_uid}/events/{uid}",
            post(update_event).delete(delete_event),
        )
        .route("/v1/locations", post(create_location))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, AppState::new(MockConfig::default())).await
}

pub async fn run_with(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

fn invalid_request(description: impl Into<String>) -> Reply {
    reply(
        StatusCode::BAD_REQUEST,
        json!({"error": "invalid_request", "error_description": description.into()}),
    )
}

async fn request_access_token(State(state): State<AppState>, Form(form): Form<Fields>) -> Reply {
    state.token_requests.fetch_add(1, Ordering::SeqCst);

    if form.get("grant-type").map(String::as_str) != Some("authorization_code") {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "unsupported_grant_type"}),
        );
    }
    if form.get("code") != Some(&state.config.secret_key) {
        debug!("rejected access token request");
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "invalid_grant", "error_description": "unknown secret key"}),
        );
    }

    let token = Uuid::new_v4().simple().to_string();
    state.db.write().await.tokens.insert(token.clone());
    info!("issued access token");

    reply(
        StatusCode::OK,
        json!({"access_token": token, "expires_in": state.config.expires_in}),
    )
}

/// Checks `access_token` and `nonce` on a mutating request.
async fn authorize(state: &AppState, form: &Fields) -> Result<(), Reply> {
    let known = match form.get("access_token") {
        Some(token) => state.db.read().await.tokens.contains(token),
        None => false,
    };
    if !known {
        return Err(reply(
            StatusCode::UNAUTHORIZED,
            json!({"error": "invalid_token", "error_description": "access token is missing or unknown"}),
        ));
    }

    match form.get("nonce").map(|nonce| nonce.parse::<u32>()) {
        Some(Ok(nonce)) if nonce < 1_000_000 => Ok(()),
        _ => Err(invalid_request("nonce: a numeric nonce is required")),
    }
}

fn data_object(form: &Fields) -> Result<Map<String, Value>, Reply> {
    let raw = form
        .get("data")
        .ok_or_else(|| invalid_request("data: field is required"))?;
    match serde_json::from_str(raw) {
        Ok(Value::Object(fields)) => Ok(fields),
        _ => Err(invalid_request("data: must be a JSON object")),
    }
}

fn title_errors(fields: &Map<String, Value>) -> Option<Reply> {
    let has_title = fields
        .get("title")
        .and_then(Value::as_object)
        .is_some_and(|languages| !languages.is_empty());
    if has_title {
        return None;
    }
    Some(reply(
        StatusCode::BAD_REQUEST,
        json!({"errors": [{
            "field": "title",
            "code": "required",
            "message": "at least one language entry is required"
        }]}),
    ))
}

fn event_json(uid: u64, event: &StoredEvent) -> Value {
    let mut fields = event.fields.clone();
    fields.insert("uid".to_string(), json!(uid));
    Value::Object(fields)
}

async fn get_event(
    State(state): State<AppState>,
    Path(uid): Path<u64>,
    Query(query): Query<Fields>,
) -> Reply {
    if query.get("key") != Some(&state.config.public_key) {
        return reply(
            StatusCode::FORBIDDEN,
            json!({"error": "invalid_key", "error_description": "a valid public key is required"}),
        );
    }

    let db = state.db.read().await;
    match db.events.get(&uid) {
        Some(event) => {
            let mut data = event_json(uid, event);
            // the read API reports uids as strings
            data["uid"] = json!(uid.to_string());
            reply(StatusCode::OK, json!({"data": data}))
        }
        None => reply(StatusCode::NOT_FOUND, json!({"error": "event not found"})),
    }
}

async fn create_event(
    State(state): State<AppState>,
    Path(agenda_uid): Path<String>,
    Form(form): Form<Fields>,
) -> Reply {
    if let Err(rejection) = authorize(&state, &form).await {
        return rejection;
    }
    let fields = match data_object(&form) {
        Ok(fields) => fields,
        Err(rejection) => return rejection,
    };
    if let Some(rejection) = title_errors(&fields) {
        return rejection;
    }

    let mut db = state.db.write().await;
    let uid = db.next_uid();
    let event = StoredEvent { agenda_uid, fields };
    let body = json!({"success": true, "event": event_json(uid, &event)});
    db.events.insert(uid, event);

    reply(StatusCode::OK, body)
}

async fn update_event(
    State(state): State<AppState>,
    Path((agenda_uid, uid)): Path<(String, u64)>,
    Form(form): Form<Fields>,
) -> Reply {
    if let Err(rejection) = authorize(&state, &form).await {
        return rejection;
    }
    let fields = match data_object(&form) {
        Ok(fields) => fields,
        Err(rejection) => return rejection,
    };

    let mut db = state.db.write().await;
    let Some(event) = db
        .events
        .get_mut(&uid)
        .filter(|event| event.agenda_uid == agenda_uid)
    else {
        return reply(StatusCode::NOT_FOUND, json!({"error": "event not found"}));
    };

    let mut merged = event.fields.clone();
    merged.extend(fields);
    if let Some(rejection) = title_errors(&merged) {
        return rejection;
    }
    event.fields = merged;

    reply(
        StatusCode::OK,
        json!({"success": true, "event": event_json(uid, event)}),
    )
}

async fn delete_event(
    State(state): State<AppState>,
    Path((agenda_uid, uid)): Path<(String, u64)>,
    Form(form): Form<Fields>,
) -> Reply {
    if let Err(rejection) = authorize(&state, &form).await {
        return rejection;
    }

    let mut db = state.db.write().await;
    let owned = db
        .events
        .get(&uid)
        .is_some_and(|event| event.agenda_uid == agenda_uid);
    if !owned {
        return reply(StatusCode::NOT_FOUND, json!({"error": "event not found"}));
    }

    match db.events.remove(&uid) {
        Some(event) => reply(
            StatusCode::OK,
            json!({"success": true, "event": event_json(uid, &event)}),
        ),
        None => reply(StatusCode::NOT_FOUND, json!({"error": "event not found"})),
    }
}

async fn create_location(State(state): State<AppState>, Form(form): Form<Fields>) -> Reply {
    if let Err(rejection) = authorize(&state, &form).await {
        return rejection;
    }
    let mut fields = match data_object(&form) {
        Ok(fields) => fields,
        Err(rejection) => return rejection,
    };

    let missing: Vec<String> = ["latitude", "longitude"]
        .into_iter()
        .filter(|name| !fields.get(*name).is_some_and(Value::is_number))
        .map(|name| {
            let mut label = name.to_string();
            label[..1].make_ascii_uppercase();
            format!("{name}: {label} is required")
        })
        .collect();
    if !missing.is_empty() {
        return invalid_request(missing.join(", "));
    }

    let mut db = state.db.write().await;
    let uid = db.next_uid();
    fields.insert("uid".to_string(), json!(uid));
    let location = Value::Object(fields);
    db.locations.insert(uid, location.clone());

    reply(StatusCode::OK, location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn title_is_required() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"slug":"a-title"}"#).unwrap();
        let (status, Json(body)) = title_errors(&fields).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "title");
        assert_eq!(body["errors"][0]["code"], "required");
    }

    #[test]
    fn empty_title_object_is_rejected() {
        let fields: Map<String, Value> = serde_json::from_str(r#"{"title":{}}"#).unwrap();
        assert!(title_errors(&fields).is_some());
    }

    #[test]
    fn title_with_one_language_passes() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"title":{"fr":"Un titre"}}"#).unwrap();
        assert!(title_errors(&fields).is_none());
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(data_object(&form(&[])).is_err());
        assert!(data_object(&form(&[("data", "[1,2]")])).is_err());
        assert!(data_object(&form(&[("data", "{nope")])).is_err());
        assert!(data_object(&form(&[("data", r#"{"a":1}"#)])).is_ok());
    }

    #[test]
    fn store_uids_increase() {
        let mut store = Store::default();
        let first = store.next_uid();
        assert!(store.next_uid() > first);
    }

    #[test]
    fn config_defaults() {
        let config = MockConfig::default();
        assert_eq!(config.expires_in, 3600);
        assert!(!config.secret_key.is_empty());
    }
}
