use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::error;

use webster_lookup::StoreExt;
use webster_types::{DictError, Store, Word};

/// Store shared across request handlers; injected, never global.
pub type SharedStore = Arc<dyn Store + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
}

#[derive(Serialize)]
struct Envelope {
    status: &'static str,
    result: Value,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api_info))
        .route("/word/{word}", get(word))
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

async fn api_info(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    respond(
        StatusCode::OK,
        "success",
        json!({ "word_url": format!("{scheme}://{host}/word/{{word}}") }),
    )
}

async fn word(State(state): State<AppState>, Path(word): Path<String>) -> Response {
    let words = match state.store.lookup_word(&word) {
        Ok(Some(words)) if !words.is_empty() => words,
        Ok(_) => return respond(StatusCode::NOT_FOUND, "success", json!([])),
        Err(err) => {
            error!("lookup '{word}' failed: {err}");
            return internal_error(&err);
        }
    };

    match word_result(state.store.as_ref(), &words) {
        Ok(result) => respond(StatusCode::OK, "success", result),
        Err(err) => {
            error!("resolving references for '{word}' failed: {err}");
            internal_error(&err)
        }
    }
}

/// The first matched entry inlined, further homographs under
/// `additional_words`, and the entry-level cross-references expanded into
/// full entries under `referenced_words`.
fn word_result(store: &dyn Store, words: &[Word]) -> Result<Value, DictError> {
    let first = &words[0];

    let mut referenced = Vec::new();
    for key in &first.referenced_words {
        if let Some(mut resolved) = store.get_words(key)? {
            referenced.append(&mut resolved);
        }
    }

    let mut result = serde_json::to_value(first)
        .map_err(|err| DictError::codec(format!("entry '{}'", first.word), err))?;
    result["additional_words"] =
        serde_json::to_value(&words[1..]).map_err(|err| DictError::codec("additional words", err))?;
    result["referenced_words"] =
        serde_json::to_value(&referenced).map_err(|err| DictError::codec("referenced words", err))?;
    Ok(result)
}

async fn not_found() -> Response {
    respond(StatusCode::NOT_FOUND, "error", json!("not found"))
}

fn internal_error(err: &DictError) -> Response {
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        "error",
        json!(format!("error looking up word: {err}")),
    )
}

fn respond(code: StatusCode, status: &'static str, result: Value) -> Response {
    let envelope = Envelope { status, result };
    let body = serde_json::to_string(&envelope)
        .unwrap_or_else(|_| r#"{"status":"error","result":"encoding failure"}"#.to_string());
    (
        code,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        )],
        body,
    )
        .into_response()
}
