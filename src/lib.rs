pub mod types;
pub mod csv_loader;
pub mod service;
pub mod model;
pub mod ml;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use model::AppConfig;
use service::{EmojiService, ERROR_EMOJI, UNAVAILABLE_EMOJI};
use types::EmojiSentiment;

#[derive(Clone)]
pub struct AppState {
    service: Arc<EmojiService>,
}

impl AppState {
    pub fn new(service: EmojiService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmojiQuery {
    text: String,
}

#[derive(Debug, Serialize)]
pub struct EmojiDetails {
    #[serde(flatten)]
    sentiment: EmojiSentiment,
    dominant_sentiment: &'static str,
}

// GET /api/emoji?text=...
async fn get_emoji(State(state): State<AppState>, Query(query): Query<EmojiQuery>) -> &'static str {
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.classify(&query.text)).await {
        Ok(emoji) => emoji,
        Err(e) => {
            tracing::error!("推論タスクエラー: {}", e);
            ERROR_EMOJI
        }
    }
}

// GET /api/emoji/details?text=...
async fn get_emoji_details(State(state): State<AppState>, Query(query): Query<EmojiQuery>) -> Response {
    if !state.service.is_available() {
        return (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_EMOJI).into_response();
    }

    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.analyze(&query.text)).await {
        Ok(Some(sentiment)) => {
            let dominant_sentiment = sentiment.dominant_sentiment();
            Json(EmojiDetails {
                sentiment,
                dominant_sentiment,
            })
            .into_response()
        }
        Ok(None) => (StatusCode::INTERNAL_SERVER_ERROR, ERROR_EMOJI).into_response(),
        Err(e) => {
            tracing::error!("推論タスクエラー: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, ERROR_EMOJI).into_response()
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/emoji", get(get_emoji))
        .route("/api/emoji/details", get(get_emoji_details))
        .with_state(state)
}

/// モデルを読み込んでHTTPサーバーを起動する
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let model_dir = PathBuf::from(&config.model.model_dir);
    let model_settings = config.model.clone();

    tracing::info!("モデルを読み込みます: {}", model_dir.display());
    let service = tokio::task::spawn_blocking(move || EmojiService::load(&model_dir, &model_settings)).await?;
    if let Some(reason) = service.unavailable_reason() {
        tracing::warn!("モデルが利用できません。すべてのリクエストに {} を返します: {}", UNAVAILABLE_EMOJI, reason);
    }

    let address = config.server.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("サーバーを起動しました: http://{}", address);

    axum::serve(listener, router(AppState::new(service))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Predictor;
    use crate::types::Prediction;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct PositivePredictor;

    impl Predictor for PositivePredictor {
        fn predict(&self, _text: &str) -> anyhow::Result<Prediction> {
            Ok(Prediction::new(
                vec!["POSITIVE".to_string(), "NEUTRAL".to_string(), "NEGATIVE".to_string()],
                vec![0.8, 0.15, 0.05],
            ))
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn ready_app() -> Router {
        router(AppState::new(EmojiService::with_predictor(Arc::new(PositivePredictor))))
    }

    #[tokio::test]
    async fn test_get_emoji() {
        let (status, body) = get(ready_app(), "/api/emoji?text=I%20love%20it").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "😊");
    }

    #[tokio::test]
    async fn test_get_emoji_unavailable() {
        let app = router(AppState::new(EmojiService::unavailable("no model")));
        let (status, body) = get(app, "/api/emoji?text=hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, UNAVAILABLE_EMOJI);
    }

    #[tokio::test]
    async fn test_get_emoji_requires_text() {
        let (status, _) = get(ready_app(), "/api/emoji").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_emoji_empty_text() {
        let (status, body) = get(ready_app(), "/api/emoji?text=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "😊");
    }

    #[tokio::test]
    async fn test_get_emoji_details() {
        let (status, body) = get(ready_app(), "/api/emoji/details?text=great").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["emoji"], "😊");
        assert_eq!(json["dominant_sentiment"], "POSITIVE");
        assert!(json["positive_probability"].as_f64().unwrap() > 0.7);
    }

    #[tokio::test]
    async fn test_get_emoji_details_unavailable() {
        let app = router(AppState::new(EmojiService::unavailable("no model")));
        let (status, body) = get(app, "/api/emoji/details?text=hello").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, UNAVAILABLE_EMOJI);
    }
}
