//! JSON-over-HTTP clients for an external model sidecar.
//!
//! Embedding endpoints:
//! - `POST {base}/embed/text`  `{"text": "..."}`
//! - `POST {base}/embed/image` `{"image_base64": "..."}`
//!
//! both answering `{"embedding": [f32, ...]}`. The answer endpoint is
//! `POST {base}/vqa` `{"image_base64", "question"}` -> `{"answer": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use mm_core::{AnswerProvider, EmbeddingProvider, MmError, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ImageRequest {
    image_base64: String,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    image_base64: String,
    question: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct AnswerResponse {
    answer: String,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MmError::InvalidConfig(format!("cannot build HTTP client: {e}")))
}

async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
    wrap: fn(String) -> MmError,
) -> Result<Resp> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| wrap(format!("request to {url} failed: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(wrap(format!("{url} returned {status}: {}", detail.trim())));
    }
    response
        .json::<Resp>()
        .await
        .map_err(|e| MmError::InvalidResponse(format!("{url}: {e}")))
}

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn embed(&self, route: &str, body: &impl Serialize) -> Result<Vec<f32>> {
        let url = format!("{}{route}", self.base_url);
        let resp: EmbeddingResponse = post_json(&self.client, &url, body, MmError::Embedding).await?;
        if resp.embedding.is_empty() {
            return Err(MmError::InvalidResponse(format!("{url}: empty embedding")));
        }
        Ok(resp.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed("/embed/text", &TextRequest { text }).await
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        let body = ImageRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(image),
        };
        self.embed("/embed/image", &body).await
    }
}

pub struct HttpAnswerProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnswerProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AnswerProvider for HttpAnswerProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn answer(&self, image: &[u8], question: &str) -> Result<String> {
        let url = format!("{}/vqa", self.base_url);
        let body = AnswerRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(image),
            question,
        };
        let resp: AnswerResponse = post_json(&self.client, &url, &body, MmError::Answer).await?;
        Ok(resp.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use base64::Engine as _;
    use serde_json::{json, Value};

    async fn spawn_sidecar() -> String {
        let app = Router::new()
            .route(
                "/embed/text",
                post(|Json(body): Json<Value>| async move {
                    let len = body["text"].as_str().unwrap_or_default().len() as f32;
                    Json(json!({ "embedding": [len, 1.0, 0.0] }))
                }),
            )
            .route(
                "/embed/image",
                post(|Json(body): Json<Value>| async move {
                    let raw = base64::engine::general_purpose::STANDARD
                        .decode(body["image_base64"].as_str().unwrap_or_default())
                        .unwrap_or_default();
                    if raw.is_empty() {
                        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": "no image" })));
                    }
                    (StatusCode::OK, Json(json!({ "embedding": [raw.len() as f32, 0.0, 1.0] })))
                }),
            )
            .route(
                "/vqa",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "answer": format!("you asked: {}", body["question"].as_str().unwrap_or_default()) }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_embed_text_and_image() {
        let base = spawn_sidecar().await;
        let p = HttpEmbeddingProvider::new(base, Duration::from_secs(5)).unwrap();
        assert_eq!(p.embed_text("abcd").await.unwrap(), vec![4.0, 1.0, 0.0]);
        assert_eq!(p.embed_image(&[1, 2, 3]).await.unwrap(), vec![3.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_error_status_is_embedding_error() {
        let base = spawn_sidecar().await;
        let p = HttpEmbeddingProvider::new(base, Duration::from_secs(5)).unwrap();
        let err = p.embed_image(&[]).await.unwrap_err();
        assert!(matches!(err, MmError::Embedding(msg) if msg.contains("422")));
    }

    #[tokio::test]
    async fn test_unreachable_sidecar() {
        let p = HttpEmbeddingProvider::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(matches!(p.embed_text("x").await, Err(MmError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_answer_provider() {
        let base = spawn_sidecar().await;
        let p = HttpAnswerProvider::new(base, Duration::from_secs(5)).unwrap();
        assert_eq!(p.answer(b"img", "what is it").await.unwrap(), "you asked: what is it");
    }
}
