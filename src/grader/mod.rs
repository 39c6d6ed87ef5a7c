//! Response grading. Two interchangeable strategies share the `ResponseGrader`
//! contract and one is chosen when the process starts:
//!   - `HeuristicGrader`: deterministic keyword overlap, no external calls
//!   - `HostedGrader`: one chat-completion call per answer

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::config::{GradingMode, HeuristicConfig, Prompts};
use crate::domain::{Concept, Difficulty, QuestionType};
use crate::error::GradeError;
use crate::openai::OpenAI;

pub mod heuristic;
pub mod hosted;

pub use heuristic::HeuristicGrader;
pub use hosted::HostedGrader;

pub const FALLBACK_FEEDBACK: &str =
  "I'm having trouble connecting to my brain right now, but that sounds like a distinct answer. Let's keep going!";

/// Everything a grader may look at for a connection/application answer.
#[derive(Clone, Debug, Default)]
pub struct AnalysisRequest {
  pub concept_id: String,
  pub concept_title: String,
  pub question_text: String,
  pub question_type: Option<QuestionType>,
  pub current_difficulty: Difficulty,
  pub response: String,
  pub core_statements: Vec<String>,
  pub target_statements: Vec<String>,
  pub expected_key_terms: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticAnalysis {
  /// 0–10.
  pub score: u8,
  pub recommended_difficulty: Difficulty,
  pub feedback: String,
  pub misconception: Option<String>,
  pub key_terms_used: Vec<String>,
  pub coverage: f64,
}

impl DiagnosticAnalysis {
  pub fn neutral() -> Self {
    Self {
      score: 5,
      recommended_difficulty: Difficulty::Intermediate,
      feedback: FALLBACK_FEEDBACK.into(),
      misconception: None,
      key_terms_used: vec![],
      coverage: 0.0,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseAnalysis {
  /// 1 (incomplete), 2 (adequate) or 3 (insightful).
  pub score: u8,
  pub feedback: String,
  pub misconception: Option<String>,
  pub key_terms_used: Vec<String>,
  pub coverage: f64,
  pub complexity: f64,
}

impl ResponseAnalysis {
  /// Neutral "adequate" grade used whenever grading cannot complete.
  pub fn neutral() -> Self {
    Self {
      score: 2,
      feedback: FALLBACK_FEEDBACK.into(),
      misconception: None,
      key_terms_used: vec![],
      coverage: 0.0,
      complexity: 0.0,
    }
  }
}

#[async_trait]
pub trait ResponseGrader: Send + Sync {
  fn name(&self) -> &'static str;

  /// Grade the open diagnostic answer and recommend a starting difficulty.
  async fn analyze_diagnostic(&self, text: &str, concept: &Concept) -> Result<DiagnosticAnalysis, GradeError>;

  /// Grade a connection/application answer on the 1–3 scale.
  async fn analyze_response(&self, request: &AnalysisRequest) -> Result<ResponseAnalysis, GradeError>;
}

/// Pick the strategy for this process. Hosted grading without a provider
/// client degrades to the heuristic strategy.
pub fn build_grader(
  mode: GradingMode,
  openai: Option<OpenAI>,
  prompts: &Prompts,
  heuristic: &HeuristicConfig,
) -> Arc<dyn ResponseGrader> {
  match (mode, openai) {
    (GradingMode::Hosted, Some(oa)) => {
      info!(target: "grader", model = %oa.eval_model, "Using hosted grading");
      Arc::new(HostedGrader::new(oa, prompts.clone()))
    }
    (GradingMode::Hosted, None) => {
      error!(target: "grader", "MASTERIT_USE_REAL_AI=true but OPENAI_API_KEY is not set; using heuristic grading");
      Arc::new(HeuristicGrader::new(heuristic.clone()))
    }
    (GradingMode::Heuristic, _) => {
      info!(target: "grader", "Using heuristic grading");
      Arc::new(HeuristicGrader::new(heuristic.clone()))
    }
  }
}
