//! Curriculum hydration.
//!
//! The provider returns a loosely-shaped concept list: questions arrive as a flat
//! array, enum values are free strings and most fields may be missing. `hydrate`
//! turns that into `Concept`s with pools keyed by type × difficulty. Nothing here
//! fails: unusable questions are dropped and missing fields get defaults.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::Prompts;
use crate::domain::{
  CognitiveLevel, Concept, ConceptMetadata, Difficulty, ExpectedResponse, ParsingConfidence, Question,
  QuestionPools, QuestionType, Remediation, SubConcept,
};
use crate::error::LlmError;
use crate::openai::OpenAI;
use crate::seeds::default_diagnostic_prompt;
use crate::util::truncate_chars;

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct RawCurriculum {
  #[serde(default)] pub concepts: Vec<RawConcept>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConcept {
  pub id: Option<String>,
  pub title: Option<String>,
  pub snippet: Option<String>,
  pub confidence: Option<f64>,
  pub source_text_snippet: Option<String>,
  pub core_statements: Vec<String>,
  pub diagnostic_prompt: Option<String>,
  pub sub_concepts: Vec<RawSubConcept>,
  pub questions: Vec<RawQuestion>,
  pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSubConcept {
  pub id: Option<String>,
  pub title: Option<String>,
  pub completed: bool,
  pub difficulty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawQuestion {
  pub id: Option<String>,
  pub text: Option<String>,
  #[serde(rename = "type")]
  pub question_type: Option<String>,
  pub difficulty: Option<String>,
  pub target_statements: Vec<usize>,
  pub cognitive_level: Option<String>,
  pub expected_response: Option<ExpectedResponse>,
  pub remediation: Option<Remediation>,
}

/// Ask the provider for a curriculum and hydrate it.
#[instrument(level = "info", skip(openai, prompts, text), fields(text_len = text.len()))]
pub async fn generate(openai: &OpenAI, prompts: &Prompts, text: &str) -> Result<Vec<Concept>, LlmError> {
  let raw: RawCurriculum = openai.generate_curriculum(prompts, text).await?;
  let concepts = hydrate(raw);
  info!(target: "curriculum", concepts = concepts.len(), "Curriculum generated");
  Ok(concepts)
}

pub fn hydrate(raw: RawCurriculum) -> Vec<Concept> {
  let mut seen = HashSet::new();
  raw
    .concepts
    .into_iter()
    .enumerate()
    .map(|(i, rc)| {
      let mut c = hydrate_concept(i, rc);
      c.id = unique_id(&mut seen, c.id);
      c
    })
    .collect()
}

fn hydrate_concept(index: usize, rc: RawConcept) -> Concept {
  let title = non_empty(rc.title).unwrap_or_else(|| format!("Concept {}", index + 1));
  let id = slugify(&non_empty(rc.id).unwrap_or_else(|| title.clone()));
  let source_text_snippet = rc.source_text_snippet.unwrap_or_default();
  let snippet =
    non_empty(rc.snippet).unwrap_or_else(|| truncate_chars(&source_text_snippet, SNIPPET_CHARS).to_string());
  let confidence = rc.confidence.map(|c| c.round().clamp(1.0, 5.0) as u8).unwrap_or(3);
  let statement_count = rc.core_statements.len();

  let mut pools = QuestionPools::default();
  for (n, rq) in rc.questions.into_iter().enumerate() {
    let Some(q) = hydrate_question(n, rq, statement_count) else { continue };
    if let Some(pool) = pools.for_type_mut(q.question_type) {
      // first question per slot wins
      pool.entry(q.difficulty).or_insert(q);
    }
  }

  let sub_concepts = rc
    .sub_concepts
    .into_iter()
    .enumerate()
    .map(|(n, s)| SubConcept {
      id: non_empty(s.id).unwrap_or_else(|| format!("sc_{}", n + 1)),
      title: s.title.unwrap_or_default(),
      completed: s.completed,
      difficulty: s.difficulty.as_deref().and_then(Difficulty::parse),
    })
    .collect();

  Concept {
    diagnostic_prompt: non_empty(rc.diagnostic_prompt).unwrap_or_else(|| default_diagnostic_prompt(&title)),
    estimated_difficulty: difficulty_for_confidence(confidence),
    parsing_confidence: parsing_confidence(&pools),
    id,
    title,
    snippet,
    confidence,
    source_text_snippet,
    core_statements: rc.core_statements,
    question_pools: pools,
    sub_concepts,
    metadata: rc.metadata.and_then(|v| serde_json::from_value::<ConceptMetadata>(v).ok()),
  }
}

/// `None` for question types that have no pool (diagnostic) or unusable entries.
fn hydrate_question(n: usize, rq: RawQuestion, statement_count: usize) -> Option<Question> {
  let text = non_empty(rq.text)?;
  let question_type = match rq.question_type.as_deref().and_then(QuestionType::parse) {
    Some(t @ (QuestionType::Connection | QuestionType::Application)) => t,
    other => {
      debug!(target: "curriculum", question_type = ?other, "Dropping question without a pool");
      return None;
    }
  };
  let difficulty = rq.difficulty.as_deref().and_then(Difficulty::parse).unwrap_or_default();
  Some(Question {
    id: non_empty(rq.id)
      .unwrap_or_else(|| format!("q_{}_{}_{}", question_type.as_str(), difficulty.as_str(), n + 1)),
    text,
    question_type,
    difficulty,
    target_statements: rq.target_statements.into_iter().filter(|i| *i < statement_count).collect(),
    cognitive_level: rq.cognitive_level.as_deref().and_then(parse_cognitive_level).unwrap_or_default(),
    expected_response: rq.expected_response,
    remediation: rq.remediation,
  })
}

/// 1–2 basic, 3 intermediate, 4–5 advanced.
pub fn difficulty_for_confidence(confidence: u8) -> Difficulty {
  match confidence {
    0..=2 => Difficulty::Basic,
    3 => Difficulty::Intermediate,
    _ => Difficulty::Advanced,
  }
}

fn parsing_confidence(pools: &QuestionPools) -> ParsingConfidence {
  let full = |p: &BTreeMap<Difficulty, Question>| p.len() == Difficulty::ALL.len();
  if full(&pools.connection) && full(&pools.application) {
    ParsingConfidence::High
  } else if !pools.connection.is_empty() && !pools.application.is_empty() {
    ParsingConfidence::Medium
  } else {
    ParsingConfidence::Low
  }
}

fn parse_cognitive_level(s: &str) -> Option<CognitiveLevel> {
  match s.trim().to_ascii_lowercase().as_str() {
    "remember" => Some(CognitiveLevel::Remember),
    "understand" => Some(CognitiveLevel::Understand),
    "apply" => Some(CognitiveLevel::Apply),
    "analyze" | "analyse" => Some(CognitiveLevel::Analyze),
    "evaluate" => Some(CognitiveLevel::Evaluate),
    "create" => Some(CognitiveLevel::Create),
    _ => None,
  }
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(title: &str) -> String {
  let mut out = String::with_capacity(title.len());
  for ch in title.chars() {
    if ch.is_ascii_alphanumeric() {
      out.push(ch.to_ascii_lowercase());
    } else if !out.is_empty() && !out.ends_with('-') {
      out.push('-');
    }
  }
  let out = out.trim_end_matches('-');
  if out.is_empty() { "concept".into() } else { out.to_string() }
}

fn unique_id(seen: &mut HashSet<String>, id: String) -> String {
  if seen.insert(id.clone()) {
    return id;
  }
  let mut n = 2;
  loop {
    let candidate = format!("{id}-{n}");
    if seen.insert(candidate.clone()) {
      return candidate;
    }
    n += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::openai::mock;

  fn parse(json: &str) -> Vec<Concept> {
    hydrate(serde_json::from_str(json).unwrap())
  }

  #[test]
  fn questions_are_pooled_by_type_and_difficulty() {
    let concepts = parse(
      r#"{"concepts":[{
        "id": "photosynthesis",
        "title": "Photosynthesis",
        "confidence": 4,
        "core_statements": ["Plants convert light", "Oxygen is released"],
        "questions": [
          {"id":"a","text":"first","type":"connection","difficulty":"basic","target_statements":[0,5]},
          {"id":"b","text":"second","type":"connection","difficulty":"basic"},
          {"id":"c","text":"third","type":"application","difficulty":"advanced","cognitive_level":"evaluate"},
          {"id":"d","text":"diag","type":"diagnostic","difficulty":"basic"}
        ]
      }]}"#,
    );
    let c = &concepts[0];
    assert_eq!(c.question_pools.connection.len(), 1);
    let basic = &c.question_pools.connection[&Difficulty::Basic];
    assert_eq!(basic.id, "a");
    assert_eq!(basic.target_statements, vec![0]);
    let adv = &c.question_pools.application[&Difficulty::Advanced];
    assert_eq!(adv.cognitive_level, CognitiveLevel::Evaluate);
    assert_eq!(c.estimated_difficulty, Difficulty::Advanced);
    assert_eq!(c.parsing_confidence, ParsingConfidence::Medium);
  }

  #[test]
  fn missing_fields_get_defaults() {
    let concepts = parse(
      r#"{"concepts":[{
        "title": "Cell Division: Mitosis & Meiosis",
        "source_text_snippet": "Cells divide.",
        "metadata": {"subject_area": "biology"},
        "questions": [
          {"text":"q","type":"application","difficulty":"extreme","remediation":{"hint":"h","example":"e"}},
          {"type":"connection"}
        ]
      }]}"#,
    );
    let c = &concepts[0];
    assert_eq!(c.id, "cell-division-mitosis-meiosis");
    assert_eq!(c.snippet, "Cells divide.");
    assert_eq!(c.confidence, 3);
    assert_eq!(c.estimated_difficulty, Difficulty::Intermediate);
    assert!(c.diagnostic_prompt.contains("Cell Division"));
    assert!(c.question_pools.connection.is_empty());
    let q = &c.question_pools.application[&Difficulty::Intermediate];
    assert_eq!(q.id, "q_application_intermediate_1");
    assert_eq!(q.remediation.as_ref().unwrap().example_answer.as_deref(), Some("e"));
    assert_eq!(c.parsing_confidence, ParsingConfidence::Low);
    assert!(c.metadata.is_none());
  }

  #[test]
  fn duplicate_ids_are_disambiguated() {
    let concepts = parse(r#"{"concepts":[{"title":"Atoms"},{"title":"Atoms"},{"id":"atoms"}]}"#);
    let ids: Vec<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["atoms", "atoms-2", "atoms-3"]);
    assert_eq!(concepts[2].title, "Concept 3");
  }

  #[test]
  fn provider_ids_are_slugged() {
    let concepts = parse(r#"{"concepts":[{"id":"Cell__Bio","title":"Cells"},{"id":"../units/SI","title":"Units"},{"id":"cell-bio"}]}"#);
    let ids: Vec<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["cell-bio", "units-si", "cell-bio-2"]);
  }

  #[test]
  fn slugs_and_confidence_mapping() {
    assert_eq!(slugify("  Natural   Selection!! "), "natural-selection");
    assert_eq!(slugify("???"), "concept");
    assert_eq!(difficulty_for_confidence(1), Difficulty::Basic);
    assert_eq!(difficulty_for_confidence(3), Difficulty::Intermediate);
    assert_eq!(difficulty_for_confidence(5), Difficulty::Advanced);
  }

  #[tokio::test]
  async fn generate_hydrates_provider_output() {
    let oa = mock::provider(
      200,
      r#"{"concepts":[{"title":"Plate Tectonics","confidence":1,"core_statements":["Plates move"],
          "questions":[{"text":"Why do plates move?","type":"connection","difficulty":"basic"}]}]}"#,
    )
    .await;
    let concepts = generate(&oa, &Prompts::default(), "The crust is made of plates.").await.unwrap();
    assert_eq!(concepts.len(), 1);
    assert_eq!(concepts[0].id, "plate-tectonics");
    assert_eq!(concepts[0].estimated_difficulty, Difficulty::Basic);
  }

  #[tokio::test]
  async fn generate_surfaces_provider_errors() {
    let oa = mock::provider(500, "").await;
    assert!(matches!(
      generate(&oa, &Prompts::default(), "text").await,
      Err(LlmError::Status { status: 500, .. })
    ));
  }
}
