//! Minimal OpenAI-compatible client for our use-cases.
//!
//! We call chat.completions three ways: a strict JSON object (grading, curriculum),
//! and a raw streamed completion that is passed through to the tutor chat.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::error::LlmError;
use crate::protocol::{ChatMessage, EvaluateIn, Evaluation};
use crate::util::{fill_template, trunc_for_log, truncate_chars};

const CLIENT_UA: &str = "masterit-backend/0.1";
/// Study material beyond this many chars is not sent to the curriculum prompt.
pub const CURRICULUM_TEXT_LIMIT: usize = 15_000;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub eval_model: String,
  pub curriculum_model: String,
  pub chat_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let mut oa = Self::new(api_key, base_url)?;
    if let Ok(m) = std::env::var("OPENAI_EVAL_MODEL") { oa.eval_model = m; }
    if let Ok(m) = std::env::var("OPENAI_CURRICULUM_MODEL") { oa.curriculum_model = m; }
    if let Ok(m) = std::env::var("OPENAI_CHAT_MODEL") { oa.chat_model = m; }
    Some(oa)
  }

  /// Client against an explicit endpoint with default models.
  pub fn new(api_key: String, base_url: String) -> Option<Self> {
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: base_url.trim_end_matches('/').to_string(),
      eval_model: "gpt-4o-mini".into(),
      curriculum_model: "gpt-4o-mini".into(),
      chat_model: "gpt-4o-mini".into(),
    })
  }

  async fn post_completion(&self, req: &ChatCompletionRequest) -> Result<reqwest::Response, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(LlmError::Status { status, message });
    }
    Ok(res)
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: DeserializeOwned>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, LlmError> {
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessage { role: "system".into(), content: system.into() },
        ChatMessage { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      stream: None,
    };

    let start = Instant::now();
    let res = self.post_completion(&req).await;
    let res = match res {
      Ok(r) => r,
      Err(e) => {
        error!(elapsed = ?start.elapsed(), error = %e, "Completion request failed");
        return Err(e);
      }
    };

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(LlmError::Empty);
    }

    serde_json::from_str::<T>(&text).map_err(|e| {
      debug!(content = %trunc_for_log(&text, 300), "Completion was not the expected JSON");
      LlmError::Parse(e)
    })
  }

  // --- High-level helpers (domain-specialized) ---

  /// Grade one explanation against the concept's ground truth.
  #[instrument(level = "info", skip(self, prompts, input),
               fields(model = %self.eval_model, concept = %input.concept, answer_len = input.answer.len()))]
  pub async fn evaluate(&self, prompts: &Prompts, input: &EvaluateIn) -> Result<Evaluation, LlmError> {
    let core = input.core_statements.join(" | ");
    let target = input.target_statements.join(" | ");
    let user = fill_template(
      &prompts.grading_user_template,
      &[
        ("core_statements",   &core),
        ("target_statements", &target),
        ("concept",           &input.concept),
        ("question",          &input.question),
        ("answer",            &input.answer),
      ],
    );
    let e: Evaluation = self.chat_json(&self.eval_model, &prompts.grading_system, &user, 0.1).await?;
    Ok(e.clamped())
  }

  /// Break study material into concepts. Returns the raw model JSON for hydration.
  #[instrument(level = "info", skip(self, prompts, text), fields(model = %self.curriculum_model, text_len = text.len()))]
  pub async fn generate_curriculum<T: DeserializeOwned>(&self, prompts: &Prompts, text: &str) -> Result<T, LlmError> {
    let text = truncate_chars(text, CURRICULUM_TEXT_LIMIT);
    let user = fill_template(&prompts.curriculum_user_template, &[("text", text)]);
    self.chat_json(&self.curriculum_model, &prompts.curriculum_system, &user, 0.2).await
  }

  /// Start a streamed tutor completion; the caller forwards the body as-is.
  #[instrument(level = "info", skip(self, prompts, messages), fields(model = %self.chat_model, messages = messages.len()))]
  pub async fn chat_stream(&self, prompts: &Prompts, messages: Vec<ChatMessage>) -> Result<reqwest::Response, LlmError> {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(ChatMessage { role: "system".into(), content: prompts.chat_system.clone() });
    all.extend(messages);
    let req = ChatCompletionRequest {
      model: self.chat_model.clone(),
      messages: all,
      temperature: 0.7,
      response_format: None,
      stream: Some(true),
    };
    self.post_completion(&req).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessage>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  stream: Option<bool>,
}
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

/// Throwaway provider for tests: answers every completion with `content`
/// (or `status` with an error body when it is not 200).
#[cfg(test)]
pub mod mock {
  use axum::{http::StatusCode, routing::post, Json, Router};
  use serde_json::json;

  use super::OpenAI;

  pub async fn provider(status: u16, content: &'static str) -> OpenAI {
    let app = Router::new().route(
      "/v1/chat/completions",
      post(move || async move {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if code.is_success() {
          (code, Json(json!({ "choices": [{ "message": { "content": content } }] })))
        } else {
          (code, Json(json!({ "error": { "message": content } })))
        }
      }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let _ = axum::serve(listener, app).await;
    });
    OpenAI::new("test-key".into(), format!("http://{}/v1", addr)).unwrap()
  }

  /// Client pointed at a port nobody listens on.
  pub async fn unreachable() -> OpenAI {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    OpenAI::new("test-key".into(), format!("http://{}/v1", addr)).unwrap()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input() -> EvaluateIn {
    EvaluateIn {
      question: "Why?".into(),
      answer: "Because traits help survival".into(),
      concept: "natural-selection-adaptive".into(),
      core_statements: vec!["a".into()],
      target_statements: vec![],
    }
  }

  #[test]
  fn extracts_provider_error_message() {
    assert_eq!(extract_openai_error(r#"{"error":{"message":"bad key"}}"#).as_deref(), Some("bad key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[tokio::test]
  async fn evaluate_parses_strict_json() {
    let oa = mock::provider(
      200,
      r#"{"isCorrect":true,"masteryScore":91,"feedback":"Whoa!","misconceptions":[],"nextSuggestedAction":"advance"}"#,
    )
    .await;
    let e = oa.evaluate(&Prompts::default(), &input()).await.unwrap();
    assert!(e.is_correct);
    assert_eq!(e.mastery_score, 91.0);
    assert_eq!(e.feedback, "Whoa!");
  }

  #[tokio::test]
  async fn evaluate_reports_malformed_json() {
    let oa = mock::provider(200, "definitely not json").await;
    let err = oa.evaluate(&Prompts::default(), &input()).await.unwrap_err();
    assert!(matches!(err, LlmError::Parse(_)));
  }

  #[tokio::test]
  async fn evaluate_reports_http_status() {
    let oa = mock::provider(500, "upstream exploded").await;
    let err = oa.evaluate(&Prompts::default(), &input()).await.unwrap_err();
    match err {
      LlmError::Status { status, message } => {
        assert_eq!(status, 500);
        assert_eq!(message, "upstream exploded");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn evaluate_reports_transport_failure() {
    let oa = mock::unreachable().await;
    let err = oa.evaluate(&Prompts::default(), &input()).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport(_)));
  }
}
