//! Hosted grading: one chat-completion call per answer.
//!
//! Provider failures (transport, HTTP status, malformed JSON) never reach the caller;
//! they are logged and replaced with the neutral grade.

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::config::Prompts;
use crate::domain::{Concept, Difficulty};
use crate::error::GradeError;
use crate::openai::OpenAI;
use crate::protocol::{EvaluateIn, Evaluation, SuggestedAction};

use super::{AnalysisRequest, DiagnosticAnalysis, ResponseAnalysis, ResponseGrader};

pub struct HostedGrader {
  openai: OpenAI,
  prompts: Prompts,
}

impl HostedGrader {
  pub fn new(openai: OpenAI, prompts: Prompts) -> Self {
    Self { openai, prompts }
  }

  async fn evaluate(&self, input: &EvaluateIn) -> Result<Evaluation, GradeError> {
    Ok(self.openai.evaluate(&self.prompts, input).await?)
  }
}

/// <60 → 1, 60–85 → 2, >85 → 3.
pub fn score_from_mastery(mastery: f64) -> u8 {
  if mastery < 60.0 {
    1
  } else if mastery > 85.0 {
    3
  } else {
    2
  }
}

pub fn difficulty_from_action(action: SuggestedAction) -> Difficulty {
  match action {
    SuggestedAction::Remediate => Difficulty::Basic,
    SuggestedAction::Advance => Difficulty::Advanced,
    SuggestedAction::Practice => Difficulty::Intermediate,
  }
}

#[async_trait]
impl ResponseGrader for HostedGrader {
  fn name(&self) -> &'static str { "hosted" }

  #[instrument(level = "info", skip(self, text, concept), fields(concept = %concept.id, text_len = text.len()))]
  async fn analyze_diagnostic(&self, text: &str, concept: &Concept) -> Result<DiagnosticAnalysis, GradeError> {
    let input = EvaluateIn {
      question: concept.diagnostic_prompt.clone(),
      answer: text.to_string(),
      concept: concept.title.clone(),
      core_statements: concept.core_statements.clone(),
      target_statements: vec![],
    };
    match self.evaluate(&input).await {
      Ok(e) => Ok(DiagnosticAnalysis {
        score: (e.mastery_score / 10.0).round() as u8,
        recommended_difficulty: difficulty_from_action(e.next_suggested_action),
        misconception: e.misconceptions.first().cloned(),
        feedback: e.feedback,
        key_terms_used: vec![],
        coverage: e.mastery_score / 100.0,
      }),
      Err(err) => {
        warn!(target: "grader", concept = %concept.id, error = %err, "Hosted diagnostic grading failed; using neutral result");
        Ok(DiagnosticAnalysis::neutral())
      }
    }
  }

  #[instrument(level = "info", skip(self, request), fields(concept = %request.concept_id, text_len = request.response.len()))]
  async fn analyze_response(&self, request: &AnalysisRequest) -> Result<ResponseAnalysis, GradeError> {
    let label = request.question_type.map(|t| t.as_str()).unwrap_or("open");
    let input = EvaluateIn {
      question: format!("[{} {}] {}", request.current_difficulty.as_str(), label, request.question_text),
      answer: request.response.clone(),
      concept: request.concept_title.clone(),
      core_statements: request.core_statements.clone(),
      target_statements: request.target_statements.clone(),
    };
    match self.evaluate(&input).await {
      Ok(e) => Ok(ResponseAnalysis {
        score: score_from_mastery(e.mastery_score),
        misconception: e.misconceptions.first().cloned(),
        feedback: e.feedback,
        key_terms_used: vec![],
        coverage: e.mastery_score / 100.0,
        complexity: 0.0,
      }),
      Err(err) => {
        warn!(target: "grader", concept = %request.concept_id, error = %err, "Hosted response grading failed; using neutral result");
        Ok(ResponseAnalysis::neutral())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grader::FALLBACK_FEEDBACK;
  use crate::openai::mock;
  use crate::seeds::seed_concepts;

  fn request() -> AnalysisRequest {
    AnalysisRequest {
      concept_id: "natural-selection-adaptive".into(),
      concept_title: "Natural Selection".into(),
      question_text: "How is natural selection like a filter?".into(),
      response: "The environment filters traits".into(),
      ..Default::default()
    }
  }

  #[test]
  fn mastery_score_bands() {
    assert_eq!(score_from_mastery(0.0), 1);
    assert_eq!(score_from_mastery(59.9), 1);
    assert_eq!(score_from_mastery(60.0), 2);
    assert_eq!(score_from_mastery(85.0), 2);
    assert_eq!(score_from_mastery(85.5), 3);
    assert_eq!(score_from_mastery(100.0), 3);
  }

  #[test]
  fn suggested_action_maps_to_difficulty() {
    assert_eq!(difficulty_from_action(SuggestedAction::Remediate), Difficulty::Basic);
    assert_eq!(difficulty_from_action(SuggestedAction::Practice), Difficulty::Intermediate);
    assert_eq!(difficulty_from_action(SuggestedAction::Advance), Difficulty::Advanced);
  }

  #[tokio::test]
  async fn network_error_yields_neutral_grade() {
    let g = HostedGrader::new(mock::unreachable().await, Prompts::default());
    let a = g.analyze_response(&request()).await.unwrap();
    assert_eq!(a.score, 2);
    assert_eq!(a.feedback, FALLBACK_FEEDBACK);
  }

  #[tokio::test]
  async fn malformed_json_yields_neutral_grade() {
    let g = HostedGrader::new(mock::provider(200, "{not json").await, Prompts::default());
    let a = g.analyze_response(&request()).await.unwrap();
    assert_eq!(a, ResponseAnalysis::neutral());
    let d = g.analyze_diagnostic("anything", &seed_concepts()[0]).await.unwrap();
    assert_eq!(d, DiagnosticAnalysis::neutral());
  }

  #[tokio::test]
  async fn provider_grade_is_mapped() {
    let g = HostedGrader::new(
      mock::provider(
        200,
        r#"{"isCorrect":true,"masteryScore":90,"feedback":"Whoa, that makes sense!","misconceptions":["fitness = strength"],"nextSuggestedAction":"advance"}"#,
      )
      .await,
      Prompts::default(),
    );
    let a = g.analyze_response(&request()).await.unwrap();
    assert_eq!(a.score, 3);
    assert_eq!(a.feedback, "Whoa, that makes sense!");
    assert_eq!(a.misconception.as_deref(), Some("fitness = strength"));

    let d = g.analyze_diagnostic("anything", &seed_concepts()[0]).await.unwrap();
    assert_eq!(d.recommended_difficulty, Difficulty::Advanced);
    assert_eq!(d.score, 9);
  }
}
