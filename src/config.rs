//! Configuration: environment settings plus an optional TOML file
//! (prompts, scoring weights, heuristic vocabulary, concept bank).
//!
//! See `AgentConfig` for the expected TOML schema. Every section is optional.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Concept;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub scoring: ScoringConfig,
  #[serde(default)]
  pub heuristic: HeuristicConfig,
  /// Replaces the built-in seed concept when non-empty.
  #[serde(default)]
  pub concepts: Vec<Concept>,
}

/// Prompts sent to the hosted provider.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub grading_system: String,
  pub grading_user_template: String,
  pub curriculum_system: String,
  pub curriculum_user_template: String,
  pub chat_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grading_system: GRADING_SYSTEM.trim().into(),
      grading_user_template: "Context:\nGROUND TRUTH (Core Facts): {core_statements}\nTARGET FOR THIS QUESTION: {target_statements}\nConcept: {concept}\nQuestion: {question}\nTeacher's Explanation: {answer}".into(),
      curriculum_system: CURRICULUM_SYSTEM.trim().into(),
      curriculum_user_template: "Analyze this material:\n\n{text}".into(),
      chat_system: CHAT_SYSTEM.trim().into(),
    }
  }
}

const GRADING_SYSTEM: &str = r#"
You are a CURIOUS, FRIENDLY HIGH SCHOOL STUDENT being taught by the user. You are NOT the teacher.
Never lecture. Never give away answers. Use informal, conversational language.

Your "feedback" field must be written in character:
- Good answer: "Whoa, that makes sense! So you're saying [paraphrase]?"
- Confusing answer: "Hmm, I'm a bit lost. Does that mean [simpler question]?"
- Misconception: "Oh, I thought I heard [misconception]... is that not right?"

Silently audit the explanation against the ground truth in the prompt:
- Core statements: the facts the student should be teaching.
- Target statements: the facts this question was meant to cover.

Return ONLY a valid JSON object:
{
  "isCorrect": boolean,
  "masteryScore": number (0-100),
  "feedback": string,
  "misconceptions": [string],
  "nextSuggestedAction": "advance" | "remediate" | "practice"
}
"#;

const CURRICULUM_SYSTEM: &str = r#"
You are an expert curriculum designer. Break the provided study material into teachable concepts.
Return ONLY valid JSON:
{
  "concepts": [
    {
      "id": "slug-id",
      "title": "Clear Concept Title",
      "snippet": "Short summary (max 200 chars)",
      "confidence": 3,
      "source_text_snippet": "Relevant source text",
      "core_statements": ["Statement 1", "Statement 2"],
      "diagnostic_prompt": "Open question about what the student already knows",
      "sub_concepts": [{ "id": "sc_1", "title": "Sub-concept", "completed": false, "difficulty": "basic" }],
      "questions": [
        {
          "id": "q_conn_basic_1",
          "text": "Question text",
          "type": "connection" | "application",
          "difficulty": "basic" | "intermediate" | "advanced",
          "target_statements": [0],
          "cognitive_level": "understand",
          "expected_response": { "length_range": [15, 30], "key_terms": ["term"] },
          "remediation": { "hint": "...", "simplified_text": "...", "example_answer": "..." }
        }
      ]
    }
  ]
}
Generate one connection and one application question for each difficulty.
"#;

const CHAT_SYSTEM: &str = r#"
You are MasterIt, an adaptive and empathetic tutor. Help the student understand concepts
through Socratic questioning and clear metaphors. Be encouraging and patient.
Never give the direct answer to a diagnostic question; guide instead.
Keep responses to 2-3 sentences, bold key terms, offer a hint when the student struggles,
and celebrate briefly before moving on when they get it right.
"#;

/// Weights for the final confidence score and the XP awarded per answer.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
  pub coverage_weight: f64,
  pub consistency_weight: f64,
  pub depth_weight: f64,
  pub xp_per_answer: u32,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self { coverage_weight: 0.3, consistency_weight: 0.4, depth_weight: 0.3, xp_per_answer: 50 }
  }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MisconceptionRule {
  pub pattern: String,
  pub note: String,
}

/// Knobs for the keyword-overlap grader.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeuristicConfig {
  /// Simulated grading latency.
  pub diagnostic_delay_ms: u64,
  pub response_delay_ms: u64,
  /// Vocabulary the diagnostic stage looks for (filtered by the concept's core statements).
  pub key_terms: Vec<String>,
  pub misconceptions: Vec<MisconceptionRule>,
}

impl Default for HeuristicConfig {
  fn default() -> Self {
    Self {
      diagnostic_delay_ms: 1500,
      response_delay_ms: 1200,
      key_terms: [
        "selection", "traits", "survival", "reproduce", "environment",
        "advantage", "offspring", "generation", "pressure", "filter",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      misconceptions: vec![
        MisconceptionRule {
          pattern: "strongest".into(),
          note: "Strength isn't the only factor - it's about fit with the environment.".into(),
        },
        MisconceptionRule {
          pattern: "want to evolve".into(),
          note: "Evolution isn't a choice - it happens over generations based on survival.".into(),
        },
      ],
    }
  }
}

/// Which grading strategy the process runs with. Chosen once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradingMode {
  Heuristic,
  Hosted,
}

/// Process settings taken from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
  pub grading_mode: GradingMode,
  pub data_dir: Option<PathBuf>,
}

impl Settings {
  pub fn from_env() -> Self {
    let use_real_ai = std::env::var("MASTERIT_USE_REAL_AI").map(|v| v == "true").unwrap_or(false);
    Self {
      grading_mode: if use_real_ai { GradingMode::Hosted } else { GradingMode::Heuristic },
      data_dir: std::env::var("MASTERIT_DATA_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "masterit_backend", %path, concepts = cfg.concepts.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "masterit_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "masterit_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
