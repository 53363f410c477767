use axum::{
    extract::{multipart::Multipart, rejection::FormRejection, DefaultBodyLimit, State},
    routing::{get, post},
    Form, Json, Router,
};
use base64::Engine as _;
use mm_library::SearchOutcome;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound for multipart request bodies.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/text2image_search", post(text2image_search))
}

pub fn vqa_routes() -> Router<AppState> {
    Router::new()
        .route("/vqa", post(vqa))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/library/rebuild", post(rebuild_library))
        .route("/library/images", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.service.stats();
    let uptime = chrono::Utc::now() - state.started_at;
    Json(json!({
        "status": "ok",
        "embedding_provider": stats.embedding_provider,
        "answer_provider": stats.answer_provider,
        "image_library_size": stats.image_library_size,
        "dimension": stats.dimension,
        "last_build": stats.last_build,
        "started_at": state.started_at,
        "uptime_secs": uptime.num_seconds(),
    }))
}

#[derive(Debug, Deserialize)]
struct SearchForm {
    #[serde(default)]
    text_query: String,
    top_k: Option<usize>,
}

async fn text2image_search(
    State(state): State<AppState>,
    form: Result<Form<SearchForm>, FormRejection>,
) -> Result<Json<Value>, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let top_k = form.top_k.unwrap_or(state.default_top_k);

    let hits = match state.service.search(&form.text_query, top_k).await? {
        SearchOutcome::EmptyCorpus => return Err(ApiError::empty_library()),
        SearchOutcome::Hits(hits) => hits,
    };
    let engine = base64::engine::general_purpose::STANDARD;
    let results: Vec<Value> = hits
        .iter()
        .map(|hit| {
            json!({
                "image": hit.identifier,
                "score": hit.score,
                "image_base64": engine.encode(&hit.payload),
            })
        })
        .collect();

    Ok(Json(json!({
        "status": "success",
        "query": form.text_query.trim(),
        "results": results,
    })))
}

/// Fields of an image-carrying multipart form.
#[derive(Default)]
struct ImageForm {
    image: Option<Vec<u8>>,
    file_name: Option<String>,
    question: Option<String>,
}

async fn read_image_form(mut multipart: Multipart) -> Result<ImageForm, ApiError> {
    let mut form = ImageForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                form.file_name = field.file_name().map(str::to_owned);
                form.image = Some(field.bytes().await?.to_vec());
            }
            "question" => form.question = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

async fn vqa(State(state): State<AppState>, multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let form = read_image_form(multipart).await?;
    let image = form.image.ok_or_else(|| ApiError::bad_request("missing form field: image"))?;
    let question = form.question.ok_or_else(|| ApiError::bad_request("missing form field: question"))?;

    let answer = state.service.describe_image(&image, &question).await?;
    Ok(Json(json!({
        "status": "success",
        "question": question.trim(),
        "answer": answer,
    })))
}

async fn rebuild_library(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let summary = state.service.rebuild().await?;
    Ok(Json(json!({
        "status": "success",
        "image_library_size": summary.image_library_size,
        "embedded": summary.embedded,
        "reused": summary.reused,
        "skipped": summary.skipped,
    })))
}

async fn upload_image(State(state): State<AppState>, multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let form = read_image_form(multipart).await?;
    let image = form.image.ok_or_else(|| ApiError::bad_request("missing form field: image"))?;
    let file_name = form
        .file_name
        .ok_or_else(|| ApiError::bad_request("image field must carry a file name"))?;

    let size = state.service.add_image(&file_name, image).await?;
    Ok(Json(json!({
        "status": "success",
        "image": file_name,
        "image_library_size": size,
    })))
}
