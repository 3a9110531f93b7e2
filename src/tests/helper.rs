use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use chrono::Duration;
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::encode;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tower::Service;

use crate::config::Config;
use crate::config::ViewerConfig;
use crate::setup_app;
use crate::storage::Memory;
use crate::storage::Storage;

pub const JWT_SECRET: &str = "verysecret";
pub const EVENTS_SECRET: &str = "eventsecret";

/// Test helper version of Note struct
#[derive(Debug, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub password_protected: bool,
    pub last_read_at: Option<String>,
}

/// Test helper version of Statistics struct
#[derive(Debug, PartialEq, Eq)]
pub struct Statistics {
    pub note_count: u64,
    pub image_count: u64,
    pub total_image_size: u64,
}

/// Error response
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub error: String,
    pub description: Option<String>,
}

/// Setup the Notesync app on an empty memory storage
pub fn setup_test_app() -> Router {
    setup_test_app_with_storage(Memory::new())
}

/// Setup the Notesync app on a given storage
pub fn setup_test_app_with_storage<S: Storage>(storage: S) -> Router {
    let config = Config {
        jwt_secret: JWT_SECRET.to_string(),
        events_secret: EVENTS_SECRET.to_string(),
        viewer: ViewerConfig {
            app_domain: "notes.example.com".to_string(),
            app_url_scheme: "mynoteapp".to_string(),
            app_store_link: None,
            play_store_link: None,
        },
    };

    setup_app(storage, config)
}

/// Authorization header for an owner
pub fn token_for(owner_id: &str) -> String {
    token_with_secret(owner_id, JWT_SECRET)
}

pub fn token_with_secret(owner_id: &str, secret: &str) -> String {
    let claims = json!({
        "sub": owner_id,
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    });

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    format!("Bearer {token}")
}

async fn send(
    app: &mut Router,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    payload: Option<&Value>,
) -> (StatusCode, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }

    let request = if let Some(payload) = payload {
        builder
            .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(Body::from(serde_json::to_vec(payload).unwrap()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status_code, body)
}

pub async fn list_notes(app: &mut Router, access_token: &str) -> (StatusCode, Option<Vec<Note>>) {
    let (status_code, body) = send(app, Method::GET, "/api/notes", Some(access_token), None).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_notes(&body))
        } else {
            None
        },
    )
}

pub async fn single_note(
    app: &mut Router,
    access_token: &str,
    note_id: &str,
) -> (StatusCode, Option<Note>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::GET,
        &format!("/api/notes/{note_id}"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_note(&body))
        } else {
            None
        },
        if status_code.is_client_error() {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_create_note(
    app: &mut Router,
    access_token: &str,
    payload: Value,
) -> (StatusCode, Option<Note>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::POST,
        "/api/notes",
        Some(access_token),
        Some(&payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some(get_note(&body))
        } else {
            None
        },
        if status_code.is_client_error() {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

/// Create a note and assume it works
pub async fn create_note(app: &mut Router, access_token: &str, payload: Value) -> Note {
    let (status_code, note, _) = maybe_create_note(app, access_token, payload).await;
    assert_eq!(StatusCode::CREATED, status_code);

    note.unwrap()
}

pub async fn maybe_create_note_with_raw_body(
    app: &mut Router,
    access_token: &str,
    body: &'static str,
    include_content_type: bool,
) -> (StatusCode, Option<Error>) {
    let mut builder = Request::builder().method(Method::POST).uri("/api/notes");

    if include_content_type {
        builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    }

    let request = builder
        .header(AUTHORIZATION, access_token)
        .body(Body::from(body.as_bytes()))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_update_note(
    app: &mut Router,
    access_token: &str,
    note_id: &str,
    payload: Value,
) -> (StatusCode, Option<Note>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::PATCH,
        &format!("/api/notes/{note_id}"),
        Some(access_token),
        Some(&payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_note(&body))
        } else {
            None
        },
        if status_code.is_client_error() {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_delete_note(
    app: &mut Router,
    access_token: &str,
    note_id: &str,
) -> (StatusCode, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::DELETE,
        &format!("/api/notes/{note_id}"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code.is_client_error() {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn statistics(app: &mut Router, access_token: &str) -> (StatusCode, Option<Statistics>) {
    let (status_code, body) =
        send(app, Method::GET, "/api/statistics", Some(access_token), None).await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_statistics(&body))
        } else {
            None
        },
    )
}

/// Fetch the statistics and assume it works
pub async fn current_statistics(app: &mut Router, access_token: &str) -> Statistics {
    let (status_code, statistics) = statistics(app, access_token).await;
    assert_eq!(StatusCode::OK, status_code);

    statistics.unwrap()
}

/// Deliver an event as the event system would, with the events secret
pub async fn deliver_event(
    app: &mut Router,
    path: &str,
    payload: Value,
) -> (StatusCode, Option<String>) {
    let authorization = format!("Bearer {EVENTS_SECRET}");

    deliver_event_with_authorization(app, path, Some(&authorization), payload).await
}

pub async fn deliver_event_with_authorization(
    app: &mut Router,
    path: &str,
    authorization: Option<&str>,
    payload: Value,
) -> (StatusCode, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::POST,
        &format!("/events{path}"),
        authorization,
        Some(&payload),
    )
    .await;

    (
        status_code,
        if status_code.is_client_error() {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

/// Call one of the remote procedures
pub async fn maybe_call(
    app: &mut Router,
    access_token: &str,
    name: &str,
    payload: Value,
) -> (StatusCode, Option<Value>, Option<String>) {
    let (status_code, body) = send(
        app,
        Method::POST,
        &format!("/api/{name}"),
        Some(access_token),
        Some(&payload),
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_data(&body))
        } else {
            None
        },
        if status_code.is_client_error() || status_code.is_server_error() {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn list_access_logs(
    app: &mut Router,
    access_token: &str,
    note_id: &str,
) -> (StatusCode, Option<Vec<Value>>) {
    let (status_code, body) = send(
        app,
        Method::GET,
        &format!("/api/notes/{note_id}/access-logs"),
        Some(access_token),
        None,
    )
    .await;

    (
        status_code,
        if status_code == StatusCode::OK {
            get_data(&body).as_array().cloned()
        } else {
            None
        },
    )
}

/// Fetch a public page
pub async fn view(app: &mut Router, path: &str) -> (StatusCode, String) {
    let (status_code, body) = send(app, Method::GET, path, None, None).await;

    (status_code, String::from_utf8_lossy(&body[..]).to_string())
}

/// Submit the password form of a public page
pub async fn unlock(app: &mut Router, path: &str, password: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(CONTENT_TYPE, mime::APPLICATION_WWW_FORM_URLENCODED.as_ref())
        .body(Body::from(format!("password={password}")))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status_code, String::from_utf8_lossy(&body[..]).to_string())
}

fn value_to_note(note: &Map<String, Value>) -> Note {
    Note {
        id: note["id"].as_str().map(ToString::to_string).unwrap(),
        title: note["title"].as_str().map(ToString::to_string).unwrap(),
        tags: note["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tag| tag.as_str().map(ToString::to_string).unwrap())
            .collect(),
        description: note["description"].as_str().map(ToString::to_string),
        image_url: note["imageUrl"].as_str().map(ToString::to_string),
        is_public: note["isPublic"].as_bool().unwrap(),
        password_protected: note["passwordProtected"].as_bool().unwrap(),
        last_read_at: note
            .get("lastReadAt")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn get_data(body: &Bytes) -> Value {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"].clone()
}

fn get_note(body: &Bytes) -> Note {
    get_data(body).as_object().map(value_to_note).unwrap()
}

fn get_notes(body: &Bytes) -> Vec<Note> {
    get_data(body)
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_object().unwrap())
        .map(value_to_note)
        .collect()
}

fn get_statistics(body: &Bytes) -> Statistics {
    let statistics = get_data(body);

    Statistics {
        note_count: statistics["noteCount"].as_u64().unwrap(),
        image_count: statistics["imageCount"].as_u64().unwrap(),
        total_image_size: statistics["totalImageSize"].as_u64().unwrap(),
    }
}

fn value_to_error(error: &Map<String, Value>) -> Error {
    Error {
        error: error["error"].as_str().map(ToString::to_string).unwrap(),
        description: error
            .get("description")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn get_error(body: &Bytes) -> Error {
    serde_json::from_slice::<Value>(&body[..])
        .unwrap()
        .as_object()
        .map(value_to_error)
        .unwrap()
}

fn get_error_message(body: &Bytes) -> String {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["error"]
        .as_str()
        .map(ToString::to_string)
        .unwrap()
}
