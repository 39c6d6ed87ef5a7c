//! Error types for the provider client, the grading strategies and the session controller.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures talking to the hosted chat-completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("provider HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("JSON parse error: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("provider returned an empty completion")]
  Empty,
}

/// Raised by a grading strategy that could not produce a result.
/// The session controller recovers from every variant.
#[derive(Debug, Error)]
pub enum GradeError {
  #[error("hosted grading failed: {0}")]
  Llm(#[from] LlmError),

  #[error("grader unavailable: {0}")]
  Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
  #[error("answer is empty")]
  EmptyAnswer,

  #[error("an answer for concept {0} is already being evaluated")]
  Busy(String),

  #[error("no session started for concept {0}")]
  NotStarted(String),

  #[error("session for concept {0} is already complete")]
  Completed(String),

  #[error("unknown concept: {0}")]
  UnknownConcept(String),

  #[error("session for concept {0} was restarted while the answer was being evaluated")]
  Superseded(String),

  #[error("evaluation for concept {0} was interrupted")]
  Interrupted(String),
}

impl SessionError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      SessionError::EmptyAnswer => StatusCode::BAD_REQUEST,
      SessionError::Busy(_) | SessionError::Completed(_) | SessionError::Superseded(_) => StatusCode::CONFLICT,
      SessionError::NotStarted(_) | SessionError::UnknownConcept(_) => StatusCode::NOT_FOUND,
      SessionError::Interrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  pub code: u16,
}

impl IntoResponse for SessionError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    let body = Json(ErrorResponse { code: status.as_u16(), error: self.to_string() });
    (status, body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn session_error_status_codes() {
    assert_eq!(SessionError::EmptyAnswer.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(SessionError::Busy("c".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(SessionError::Completed("c".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(SessionError::NotStarted("c".into()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(SessionError::UnknownConcept("c".into()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(SessionError::Superseded("c".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(SessionError::Interrupted("c".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn llm_status_error_mentions_code() {
    let e = LlmError::Status { status: 503, message: "overloaded".into() };
    assert_eq!(e.to_string(), "provider HTTP 503: overloaded");
    let g: GradeError = e.into();
    assert!(g.to_string().contains("503"));
  }
}
