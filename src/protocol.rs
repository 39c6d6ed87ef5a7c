//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{
  AdaptationEvent, AnswerRecord, Concept, CycleSummary, Difficulty, Question, QuestionType, Remediation,
};
use crate::grader::FALLBACK_FEEDBACK;
use crate::session::Session;

//
// Grading endpoint (/api/evaluate)
//

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateIn {
  pub question: String,
  pub answer: String,
  pub concept: String,
  #[serde(default)] pub core_statements: Vec<String>,
  #[serde(default)] pub target_statements: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
  Advance,
  Remediate,
  #[default]
  Practice,
}

/// Strict JSON object the grading prompt demands from the provider.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
  #[serde(default)] pub is_correct: bool,
  pub mastery_score: f64,
  #[serde(default)] pub feedback: String,
  #[serde(default)] pub misconceptions: Vec<String>,
  #[serde(default)] pub next_suggested_action: SuggestedAction,
}

impl Evaluation {
  /// Served when grading cannot complete; maps to the neutral 1–3 grade of 2.
  pub fn neutral() -> Self {
    Self {
      is_correct: true,
      mastery_score: 80.0,
      feedback: FALLBACK_FEEDBACK.into(),
      misconceptions: vec![],
      next_suggested_action: SuggestedAction::Practice,
    }
  }

  pub fn clamped(mut self) -> Self {
    self.mastery_score = self.mastery_score.clamp(0.0, 100.0);
    self
  }
}

//
// Curriculum + chat
//

#[derive(Debug, Deserialize)]
pub struct GenerateConceptsIn {
  pub text: String,
}
#[derive(Debug, Serialize)]
pub struct ConceptsOut {
  pub concepts: Vec<Concept>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}
#[derive(Debug, Deserialize)]
pub struct ChatIn {
  pub messages: Vec<ChatMessage>,
}

//
// Session endpoints
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptRef {
  pub concept_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
  pub concept_id: String,
  pub answer: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationKind {
  Hint,
  Simplify,
  Example,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationQuery {
  pub concept_id: String,
  pub kind: RemediationKind,
}
#[derive(Debug, Serialize)]
pub struct RemediationOut {
  pub text: String,
}

/// Remediation text for the requested kind, if the question has any.
pub fn remediation_text(r: &Remediation, kind: RemediationKind) -> Option<String> {
  match kind {
    RemediationKind::Hint => Some(r.hint.clone()).filter(|h| !h.is_empty()),
    RemediationKind::Simplify => r.simplified_text.clone(),
    RemediationKind::Example => r.example_answer.as_ref().map(|e| format!("For example: \"{}\"", e)),
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub concept_id: String,
  pub concept_title: String,
  pub difficulty: Difficulty,
  pub question_type: QuestionType,
  pub question_index: u32,
  pub progress: f64,
  pub current_question: Question,
  pub adaptation: Option<AdaptationEvent>,
  pub evaluating: bool,
  pub complete: bool,
  pub history: Vec<AnswerRecord>,
  pub summary: Option<CycleSummary>,
}

pub fn session_view(s: &Session) -> SessionView {
  SessionView {
    concept_id: s.concept.id.clone(),
    concept_title: s.concept.title.clone(),
    difficulty: s.difficulty,
    question_type: s.question_type,
    question_index: s.question_index,
    progress: s.progress(),
    current_question: s.current_question.clone(),
    adaptation: s.adaptation.clone(),
    evaluating: s.is_evaluating(),
    complete: s.is_complete(),
    history: s.history.clone(),
    summary: s.summary.clone(),
  }
}

/// Result of one submitted answer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOut {
  pub score: u8,
  pub feedback: String,
  pub misconception: Option<String>,
  pub adaptation: Option<AdaptationEvent>,
  pub is_complete: bool,
  pub summary: Option<CycleSummary>,
  pub session: SessionView,
}

//
// Profile
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileIn {
  #[serde(default)] pub user_name: Option<String>,
  #[serde(default)] pub study_material: Option<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub grader: &'static str,
}

#[derive(Serialize)]
pub struct ErrorOut {
  pub error: String,
}
