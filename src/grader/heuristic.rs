//! Keyword-overlap grading. Deterministic: the same text always gets the same grade.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::HeuristicConfig;
use crate::domain::{Concept, Difficulty};
use crate::error::GradeError;
use crate::util::{contains_any, word_count};

use super::{AnalysisRequest, DiagnosticAnalysis, ResponseAnalysis, ResponseGrader};

const CAUSAL: &[&str] = &["because", "since", "leads to", "due to"];
const COMPARATIVE: &[&str] = &["however", "unlike", "similar to", "whereas"];
/// The diagnostic bonus only looks at these two connectives.
const DIAGNOSTIC_CONNECTIVES: &[&str] = &["because", "however"];

pub struct HeuristicGrader {
  cfg: HeuristicConfig,
}

impl HeuristicGrader {
  pub fn new(cfg: HeuristicConfig) -> Self {
    Self { cfg }
  }

  async fn simulate_latency(&self, ms: u64) {
    if ms > 0 {
      tokio::time::sleep(Duration::from_millis(ms)).await;
    }
  }

  /// Vocabulary terms that occur somewhere in the concept's core statements.
  pub fn extract_key_terms(&self, concept: &Concept) -> Vec<String> {
    let statements = concept.core_statements.join(" ").to_lowercase();
    self.cfg.key_terms
      .iter()
      .filter(|t| statements.contains(&t.to_lowercase()))
      .cloned()
      .collect()
  }

  pub fn grade_diagnostic(&self, text: &str, concept: &Concept) -> DiagnosticAnalysis {
    let lower = text.to_lowercase();
    let key_terms = self.extract_key_terms(concept);
    let matched: Vec<String> = key_terms
      .iter()
      .filter(|t| lower.contains(&t.to_lowercase()))
      .cloned()
      .collect();

    let coverage = matched.len() as f64 / key_terms.len().max(1) as f64;
    let mut score = (coverage * 10.0).round() as u8;
    if word_count(&lower) > 20 { score += 1; }
    if contains_any(&lower, DIAGNOSTIC_CONNECTIVES) { score += 1; }
    let score = score.min(10);

    DiagnosticAnalysis {
      score,
      recommended_difficulty: difficulty_for_diagnostic(score),
      feedback: diagnostic_feedback(score, &matched),
      misconception: self.detect_misconception(&lower),
      key_terms_used: matched,
      coverage,
    }
  }

  pub fn grade_response(&self, request: &AnalysisRequest) -> ResponseAnalysis {
    let lower = request.response.to_lowercase();
    let key_terms: Vec<String> = request.expected_key_terms.iter().map(|t| t.to_lowercase()).collect();
    let matched: Vec<String> = key_terms.iter().filter(|t| lower.contains(t.as_str())).cloned().collect();
    let coverage = if key_terms.is_empty() { 0.0 } else { matched.len() as f64 / key_terms.len() as f64 };

    let has_causal = contains_any(&lower, CAUSAL);
    let has_comparative = contains_any(&lower, COMPARATIVE);

    let mut score = 1;
    if coverage > 0.4 || (coverage > 0.2 && request.response.chars().count() > 30) { score = 2; }
    if coverage > 0.7 && (has_causal || has_comparative) { score = 3; }

    let complexity = (if has_causal { 0.5 } else { 0.0 }) + (if has_comparative { 0.5 } else { 0.0 });
    ResponseAnalysis {
      score,
      feedback: response_feedback(score, &matched),
      misconception: self.detect_misconception(&lower),
      key_terms_used: matched,
      coverage,
      complexity,
    }
  }

  fn detect_misconception(&self, lower: &str) -> Option<String> {
    self.cfg.misconceptions
      .iter()
      .find(|m| lower.contains(&m.pattern.to_lowercase()))
      .map(|m| m.note.clone())
  }
}

#[async_trait]
impl ResponseGrader for HeuristicGrader {
  fn name(&self) -> &'static str { "heuristic" }

  #[instrument(level = "debug", skip(self, text, concept), fields(concept = %concept.id, text_len = text.len()))]
  async fn analyze_diagnostic(&self, text: &str, concept: &Concept) -> Result<DiagnosticAnalysis, GradeError> {
    self.simulate_latency(self.cfg.diagnostic_delay_ms).await;
    let a = self.grade_diagnostic(text, concept);
    debug!(target: "grader", score = a.score, recommended = a.recommended_difficulty.as_str(), "Heuristic diagnostic graded");
    Ok(a)
  }

  #[instrument(level = "debug", skip(self, request), fields(concept = %request.concept_id, text_len = request.response.len()))]
  async fn analyze_response(&self, request: &AnalysisRequest) -> Result<ResponseAnalysis, GradeError> {
    self.simulate_latency(self.cfg.response_delay_ms).await;
    let a = self.grade_response(request);
    debug!(target: "grader", score = a.score, coverage = a.coverage, "Heuristic response graded");
    Ok(a)
  }
}

/// score ≤ 3 → basic, score ≥ 7 → advanced, else intermediate.
pub fn difficulty_for_diagnostic(score: u8) -> Difficulty {
  if score <= 3 {
    Difficulty::Basic
  } else if score >= 7 {
    Difficulty::Advanced
  } else {
    Difficulty::Intermediate
  }
}

fn diagnostic_feedback(score: u8, terms: &[String]) -> String {
  if score >= 7 {
    let first: Vec<&str> = terms.iter().take(2).map(String::as_str).collect();
    format!("Great job! You identified key concepts like {}.", first.join(", "))
  } else if score >= 4 {
    let first = terms.first().map(String::as_str).unwrap_or("some ideas");
    format!("Good start. You mentioned {}, but missed a few details.", first)
  } else {
    "That's a start. Let's build up your understanding from the basics.".into()
  }
}

fn response_feedback(score: u8, terms: &[String]) -> String {
  match score {
    3 => "Excellent! You connected the concepts clearly.".into(),
    2 => format!("Good. You correctly used terms like {}.", terms.first().map(String::as_str).unwrap_or("keyword")),
    _ => "You're on the right track, but try to explain *why* that happens.".into(),
  }
}
