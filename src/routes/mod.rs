//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - the grading / curriculum / chat endpoints under `/api/...`
/// - session and profile endpoints under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Provider-backed endpoints
        .route("/api/evaluate", post(http::http_post_evaluate))
        .route("/api/generate-concepts", post(http::http_post_generate_concepts))
        .route("/api/chat", post(http::http_post_chat))
        // Concepts + sessions
        .route("/api/v1/concepts", get(http::http_get_concepts))
        .route("/api/v1/session", get(http::http_get_session))
        .route("/api/v1/session/start", post(http::http_post_session_start))
        .route("/api/v1/session/answer", post(http::http_post_session_answer))
        .route("/api/v1/session/clear_adaptation", post(http::http_post_clear_adaptation))
        .route("/api/v1/session/reset", post(http::http_post_session_reset))
        .route("/api/v1/session/remediation", get(http::http_get_remediation))
        // Profile
        .route("/api/v1/profile", get(http::http_get_profile).post(http::http_post_profile))
        .route("/api/v1/profile/reset", post(http::http_post_profile_reset))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::seeds::SEED_CONCEPT_ID;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::for_tests(None));
        (build_router(state.clone()), state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_grader() {
        let (app, _) = app();
        let (status, body) = send(&app, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["grader"], "heuristic");
    }

    #[tokio::test]
    async fn evaluate_without_provider_returns_neutral() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            post_json("/api/evaluate", json!({"question": "q", "answer": "a", "concept": "c"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isCorrect"], true);
        assert_eq!(body["masteryScore"], 80.0);
        assert_eq!(body["nextSuggestedAction"], "practice");
    }

    #[tokio::test]
    async fn chat_without_provider_is_unavailable() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            post_json("/api/chat", json!({"messages": [{"role": "user", "content": "hi"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn session_flow_over_http() {
        let (app, state) = app();
        let (status, concepts) = send(&app, get("/api/v1/concepts")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(concepts["concepts"][0]["id"], SEED_CONCEPT_ID);

        let (status, view) = send(&app, post_json("/api/v1/session/start", json!({"conceptId": SEED_CONCEPT_ID}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["questionType"], "diagnostic");
        assert_eq!(view["difficulty"], "intermediate");

        let (status, _) = send(
            &app,
            post_json("/api/v1/session/answer", json!({"conceptId": SEED_CONCEPT_ID, "answer": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, out) = send(
            &app,
            post_json("/api/v1/session/answer", json!({"conceptId": SEED_CONCEPT_ID, "answer": "no idea"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["adaptation"]["type"], "difficulty_decrease");
        assert_eq!(out["session"]["questionType"], "connection");
        assert_eq!(out["session"]["currentQuestion"]["id"], "q_conn_basic_1");

        let uri = format!("/api/v1/session/remediation?conceptId={}&kind=example", SEED_CONCEPT_ID);
        let (status, help) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(help["text"].as_str().unwrap().starts_with("For example: \""));

        let (_, view) = send(
            &app,
            post_json("/api/v1/session/clear_adaptation", json!({"conceptId": SEED_CONCEPT_ID})),
        )
        .await;
        assert!(view["adaptation"].is_null());

        let (status, profile) = send(&app, get("/api/v1/profile")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["totalXp"], 50);

        let (status, _) = send(&app, post_json("/api/v1/session/reset", json!({"conceptId": SEED_CONCEPT_ID}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.view(SEED_CONCEPT_ID).await.is_err());
    }

    #[tokio::test]
    async fn unknown_and_unstarted_sessions_are_404() {
        let (app, _) = app();
        let (status, body) = send(&app, post_json("/api/v1/session/start", json!({"conceptId": "nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);

        let (status, _) = send(&app, get(&format!("/api/v1/session?conceptId={}", SEED_CONCEPT_ID))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_update_and_reset() {
        let (app, _) = app();
        let (status, p) = send(&app, post_json("/api/v1/profile", json!({"userName": "  Grace "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(p["userName"], "Grace");
        assert_eq!(p["studyMaterial"], "");

        let (_, p) = send(&app, post_json("/api/v1/profile/reset", json!({}))).await;
        assert_eq!(p["userName"], "");
        assert_eq!(p["totalXp"], 0);
    }
}
