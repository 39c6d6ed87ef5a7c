//! Domain models: difficulty scale, question types, concepts with their question pools,
//! answer records, adaptation events and the cycle summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered difficulty scale. Adaptation only ever moves one step along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Basic,
  Intermediate,
  Advanced,
}
impl Default for Difficulty {
  fn default() -> Self { Difficulty::Intermediate }
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Basic, Difficulty::Intermediate, Difficulty::Advanced];

  /// One step up; `None` when already at the top.
  pub fn raise(self) -> Option<Difficulty> {
    match self {
      Difficulty::Basic => Some(Difficulty::Intermediate),
      Difficulty::Intermediate => Some(Difficulty::Advanced),
      Difficulty::Advanced => None,
    }
  }

  /// One step down; `None` when already at the bottom.
  pub fn lower(self) -> Option<Difficulty> {
    match self {
      Difficulty::Basic => None,
      Difficulty::Intermediate => Some(Difficulty::Basic),
      Difficulty::Advanced => Some(Difficulty::Intermediate),
    }
  }

  pub fn rank(self) -> u8 {
    match self {
      Difficulty::Basic => 1,
      Difficulty::Intermediate => 2,
      Difficulty::Advanced => 3,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Basic => "basic",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Advanced => "advanced",
    }
  }

  pub fn parse(s: &str) -> Option<Difficulty> {
    match s.trim().to_ascii_lowercase().as_str() {
      "basic" => Some(Difficulty::Basic),
      "intermediate" => Some(Difficulty::Intermediate),
      "advanced" => Some(Difficulty::Advanced),
      _ => None,
    }
  }
}

/// Stage of the linear question flow. Never regresses within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  Diagnostic,
  Connection,
  Application,
}

impl QuestionType {
  /// The stage after this one; application is terminal.
  pub fn next(self) -> Option<QuestionType> {
    match self {
      QuestionType::Diagnostic => Some(QuestionType::Connection),
      QuestionType::Connection => Some(QuestionType::Application),
      QuestionType::Application => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      QuestionType::Diagnostic => "diagnostic",
      QuestionType::Connection => "connection",
      QuestionType::Application => "application",
    }
  }

  pub fn parse(s: &str) -> Option<QuestionType> {
    match s.trim().to_ascii_lowercase().as_str() {
      "diagnostic" => Some(QuestionType::Diagnostic),
      "connection" => Some(QuestionType::Connection),
      "application" => Some(QuestionType::Application),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveLevel {
  Remember,
  Understand,
  Apply,
  Analyze,
  Evaluate,
  Create,
}
impl Default for CognitiveLevel {
  fn default() -> Self { CognitiveLevel::Understand }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingConfidence {
  High,
  Medium,
  Low,
}
impl Default for ParsingConfidence {
  fn default() -> Self { ParsingConfidence::Medium }
}

/// What a good answer looks like: rough word range and the terms a grader looks for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedResponse {
  #[serde(default)] pub length_range: (u32, u32),
  #[serde(default)] pub key_terms: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
  #[serde(default)] pub hint: String,
  #[serde(default, alias = "simplifiedText")] pub simplified_text: Option<String>,
  // generated curricula sometimes call it "example"
  #[serde(default, alias = "example")] pub example_answer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  pub text: String,
  #[serde(rename = "type")]
  pub question_type: QuestionType,
  pub difficulty: Difficulty,
  /// Indices into the owning concept's `core_statements`.
  #[serde(default)] pub target_statements: Vec<usize>,
  #[serde(default)] pub cognitive_level: CognitiveLevel,
  #[serde(default)] pub expected_response: Option<ExpectedResponse>,
  #[serde(default)] pub remediation: Option<Remediation>,
}

impl Question {
  pub fn key_terms(&self) -> &[String] {
    self.expected_response.as_ref().map(|e| e.key_terms.as_slice()).unwrap_or(&[])
  }
}

/// Connection and application questions, at most one per difficulty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionPools {
  #[serde(default)] pub connection: BTreeMap<Difficulty, Question>,
  #[serde(default)] pub application: BTreeMap<Difficulty, Question>,
}

impl QuestionPools {
  pub fn for_type(&self, question_type: QuestionType) -> Option<&BTreeMap<Difficulty, Question>> {
    match question_type {
      QuestionType::Connection => Some(&self.connection),
      QuestionType::Application => Some(&self.application),
      QuestionType::Diagnostic => None,
    }
  }

  pub fn for_type_mut(&mut self, question_type: QuestionType) -> Option<&mut BTreeMap<Difficulty, Question>> {
    match question_type {
      QuestionType::Connection => Some(&mut self.connection),
      QuestionType::Application => Some(&mut self.application),
      QuestionType::Diagnostic => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubConcept {
  pub id: String,
  pub title: String,
  #[serde(default)] pub completed: bool,
  #[serde(default)] pub difficulty: Option<Difficulty>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConceptMetadata {
  pub text_complexity_score: f64,
  pub concept_density: f64,
  pub subject_area: String,
}

/// A teachable unit: ground-truth statements plus its question bank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Concept {
  pub id: String,
  pub title: String,
  /// One-line summary shown on the concept card.
  #[serde(default)] pub snippet: String,
  /// Estimated difficulty on a 1–5 scale.
  #[serde(default = "default_confidence")] pub confidence: u8,
  #[serde(default)] pub source_text_snippet: String,
  #[serde(default)] pub core_statements: Vec<String>,
  #[serde(default)] pub question_pools: QuestionPools,
  pub diagnostic_prompt: String,
  #[serde(default)] pub estimated_difficulty: Difficulty,
  #[serde(default)] pub parsing_confidence: ParsingConfidence,
  #[serde(default)] pub sub_concepts: Vec<SubConcept>,
  #[serde(default)] pub metadata: Option<ConceptMetadata>,
}

fn default_confidence() -> u8 { 3 }

impl Concept {
  /// Core statements addressed by the given indices, skipping any out of range.
  pub fn statements_at(&self, indices: &[usize]) -> Vec<String> {
    indices.iter().filter_map(|i| self.core_statements.get(*i).cloned()).collect()
  }
}

/// One graded answer. `score` is always on the 1–3 scale; the diagnostic stage's
/// 0–10 score is kept in `raw_score`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
  pub question: Question,
  pub answer: String,
  pub score: u8,
  #[serde(default)] pub raw_score: Option<u8>,
  pub question_type: QuestionType,
  pub difficulty: Difficulty,
  pub answered_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptationKind {
  #[serde(rename = "difficulty_increase")]
  Increase,
  #[serde(rename = "difficulty_decrease")]
  Decrease,
}

/// Announcement payload for a difficulty change. `to` is always one step from `from`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdaptationEvent {
  #[serde(rename = "type")]
  pub kind: AdaptationKind,
  pub from: Difficulty,
  pub to: Difficulty,
  pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasteryLabel {
  Strong,
  Developing,
  Starting,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
  pub start: Difficulty,
  pub end: Difficulty,
  /// Difficulty at the time of each answer.
  pub path: Vec<Difficulty>,
}

/// Terminal artifact of a completed session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
  pub concept_id: String,
  pub concept_title: String,
  pub final_confidence: u8,
  pub mastery: MasteryLabel,
  pub coverage: f64,
  pub consistency: f64,
  pub depth: f64,
  pub xp_earned: u32,
  pub trajectory: Trajectory,
  pub history: Vec<AnswerRecord>,
}
