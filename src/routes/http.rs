//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs ids, lengths and basic result info.

use std::sync::Arc;
use axum::{
  body::Body,
  extract::{Query, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::error::SessionError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, grader: state.sessions.grader_name() })
}

#[instrument(level = "info", skip(state, body), fields(concept = %body.concept, answer_len = body.answer.len()))]
pub async fn http_post_evaluate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EvaluateIn>,
) -> impl IntoResponse {
  let e = do_evaluate(&state, &body).await;
  info!(target: "grader", mastery = e.mastery_score, action = ?e.next_suggested_action, "HTTP evaluate served");
  Json(e)
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_generate_concepts(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateConceptsIn>,
) -> impl IntoResponse {
  let concepts = do_generate_concepts(&state, &body.text).await;
  Json(ConceptsOut { concepts })
}

/// Streams the provider's SSE body through untouched.
#[instrument(level = "info", skip(state, body), fields(messages = body.messages.len()))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChatIn>,
) -> Response {
  let Some(oa) = &state.openai else {
    error!(target: "masterit_backend", "Chat requested without OPENAI_API_KEY");
    return (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorOut { error: "Chat is not configured".into() })).into_response();
  };
  match oa.chat_stream(&state.prompts, body.messages).await {
    Ok(res) => (
      [(header::CONTENT_TYPE, "text/event-stream"), (header::CACHE_CONTROL, "no-cache")],
      Body::from_stream(res.bytes_stream()),
    )
      .into_response(),
    Err(e) => {
      error!(target: "masterit_backend", error = %e, "Chat completion failed");
      (StatusCode::BAD_GATEWAY, Json(ErrorOut { error: "Failed to process chat".into() })).into_response()
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_concepts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let concepts = state.concepts.read().await.clone();
  Json(ConceptsOut { concepts })
}

#[instrument(level = "info", skip(state, body), fields(concept_id = %body.concept_id))]
pub async fn http_post_session_start(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ConceptRef>,
) -> Result<Json<SessionView>, SessionError> {
  Ok(Json(start_session(&state, &body.concept_id).await?))
}

#[instrument(level = "info", skip(state, q), fields(concept_id = %q.concept_id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ConceptRef>,
) -> Result<Json<SessionView>, SessionError> {
  Ok(Json(state.sessions.view(&q.concept_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(concept_id = %body.concept_id, answer_len = body.answer.len()))]
pub async fn http_post_session_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<SubmitOut>, SessionError> {
  let out = state.sessions.submit_answer(&body.concept_id, &body.answer).await?;
  info!(target: "session", concept_id = %body.concept_id, score = out.score, complete = out.is_complete, "HTTP answer graded");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(concept_id = %body.concept_id))]
pub async fn http_post_clear_adaptation(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ConceptRef>,
) -> Result<Json<SessionView>, SessionError> {
  state.sessions.clear_adaptation(&body.concept_id).await?;
  Ok(Json(state.sessions.view(&body.concept_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(concept_id = %body.concept_id))]
pub async fn http_post_session_reset(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ConceptRef>,
) -> StatusCode {
  state.sessions.reset(&body.concept_id).await;
  StatusCode::NO_CONTENT
}

#[instrument(level = "info", skip(state, q), fields(concept_id = %q.concept_id, kind = ?q.kind))]
pub async fn http_get_remediation(
  State(state): State<Arc<AppState>>,
  Query(q): Query<RemediationQuery>,
) -> Result<Json<RemediationOut>, SessionError> {
  let text = remediation_for(&state, &q.concept_id, q.kind).await?;
  Ok(Json(RemediationOut { text }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.profile.read().await.clone())
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_profile(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProfileIn>,
) -> impl IntoResponse {
  Json(update_profile(&state, &body).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_profile_reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(reset_profile(&state).await)
}
