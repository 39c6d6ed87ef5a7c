//! Per-concept session state and the adaptation policy.
//!
//! The flow is fixed: diagnostic → connection → application. Difficulty starts at
//! intermediate and moves at most one step per adaptation event.

use chrono::Utc;

use crate::domain::{
  AdaptationEvent, AdaptationKind, AnswerRecord, Concept, CycleSummary, Difficulty, Question, QuestionType,
};
use crate::grader::{DiagnosticAnalysis, ResponseAnalysis};
use crate::seeds::{diagnostic_question, open_ended_question};
use crate::store::LocalStore;

/// Every session entry lives under this store prefix.
pub const SESSION_PREFIX: &str = "masterit:session:";

/// Number of questions in one cycle.
pub const QUESTIONS_PER_CYCLE: u32 = 3;

pub const DIAGNOSTIC_DECREASE_REASON: &str = "Starting with foundational concepts based on your explanation.";
pub const DIAGNOSTIC_INCREASE_REASON: &str = "Strong start! Jumping straight to advanced connections.";
const CONNECTION_DECREASE_REASON: &str = "Let's review the basics before moving on.";
const CONNECTION_INCREASE_REASON: &str = "Great insight! Let's try a harder application.";

#[derive(Clone, Debug)]
pub struct Session {
  pub concept: Concept,
  pub difficulty: Difficulty,
  pub question_type: QuestionType,
  pub question_index: u32,
  pub current_question: Question,
  pub history: Vec<AnswerRecord>,
  /// Latest announcement, until the UI clears it or the next answer replaces it.
  pub adaptation: Option<AdaptationEvent>,
  /// Token of the grading call in flight, if any. A result is applied only while
  /// its token is still the current claim.
  pub claim: Option<u64>,
  pub summary: Option<CycleSummary>,
}

impl Session {
  pub fn new(concept: Concept) -> Self {
    let current_question = diagnostic_question(&concept);
    Self {
      concept,
      difficulty: Difficulty::Intermediate,
      question_type: QuestionType::Diagnostic,
      question_index: 0,
      current_question,
      history: Vec::new(),
      adaptation: None,
      claim: None,
      summary: None,
    }
  }

  /// Fresh session overlaid with whatever was persisted for this concept.
  pub fn restore(concept: Concept, store: &LocalStore) -> Self {
    let keys = SessionKeys::new(&concept.id);
    let mut s = Session::new(concept);
    if let Some(d) = store.get_json::<Difficulty>(&keys.difficulty) {
      s.difficulty = d;
    }
    if let Some(t) = store.get_json::<QuestionType>(&keys.question_type) {
      s.question_type = t;
    }
    if let Some(i) = store.get_json::<u32>(&keys.question_index) {
      s.question_index = i;
    }
    if let Some(h) = store.get_json::<Vec<AnswerRecord>>(&keys.history) {
      s.history = h;
    }
    s.current_question = select_question(&s.concept, s.question_type, s.difficulty);
    s
  }

  pub fn persist(&self, store: &LocalStore) {
    let keys = SessionKeys::new(&self.concept.id);
    store.set_json(&keys.difficulty, &self.difficulty);
    store.set_json(&keys.question_type, &self.question_type);
    store.set_json(&keys.question_index, &self.question_index);
    store.set_json(&keys.history, &self.history);
  }

  pub fn is_evaluating(&self) -> bool {
    self.claim.is_some()
  }

  /// The terminal application answer has been recorded.
  pub fn is_complete(&self) -> bool {
    self.history.iter().any(|r| r.question_type == QuestionType::Application)
  }

  pub fn progress(&self) -> f64 {
    (f64::from(self.question_index) / f64::from(QUESTIONS_PER_CYCLE) * 100.0).min(100.0)
  }

  fn record(&mut self, answer: &str, score: u8, raw_score: Option<u8>) {
    self.history.push(AnswerRecord {
      question: self.current_question.clone(),
      answer: answer.to_string(),
      score,
      raw_score,
      question_type: self.question_type,
      difficulty: self.difficulty,
      answered_at: Utc::now(),
    });
  }

  /// Move to the next stage; application is terminal and stays put.
  fn advance(&mut self, difficulty: Difficulty, adaptation: Option<AdaptationEvent>) {
    let next = self.question_type.next().unwrap_or(self.question_type);
    self.adaptation = adaptation;
    self.difficulty = difficulty;
    self.question_type = next;
    self.current_question = select_question(&self.concept, next, difficulty);
    self.question_index += 1;
  }

  /// Diagnostic stage: the recommendation becomes the difficulty, then connection.
  /// The history score is the recommendation's rank on the 1–3 scale. Outside the
  /// diagnostic stage this is a no-op.
  pub fn apply_diagnostic(&mut self, answer: &str, analysis: &DiagnosticAnalysis) -> Option<AdaptationEvent> {
    if self.question_type != QuestionType::Diagnostic {
      return None;
    }
    self.record(answer, analysis.recommended_difficulty.rank(), Some(analysis.score));
    let event = diagnostic_adaptation(self.difficulty, analysis.recommended_difficulty);
    let to = event.as_ref().map(|e| e.to).unwrap_or(self.difficulty);
    self.advance(to, event.clone());
    event
  }

  /// Connection stage adapts and moves on; application stage records and ends the cycle.
  /// Ignored at the diagnostic stage or once the cycle is complete.
  pub fn apply_response(&mut self, answer: &str, analysis: &ResponseAnalysis) -> Option<AdaptationEvent> {
    if self.question_type == QuestionType::Diagnostic || self.is_complete() {
      return None;
    }
    let score = analysis.score.clamp(1, 3);
    self.record(answer, score, None);
    match self.question_type {
      QuestionType::Connection => {
        let event = connection_adaptation(self.difficulty, score, &analysis.feedback);
        let to = event.as_ref().map(|e| e.to).unwrap_or(self.difficulty);
        self.advance(to, event.clone());
        event
      }
      _ => {
        self.adaptation = None;
        self.question_index += 1;
        None
      }
    }
  }
}

/// Store keys for one concept's session fields.
pub struct SessionKeys {
  pub prefix: String,
  pub difficulty: String,
  pub question_type: String,
  pub question_index: String,
  pub history: String,
}

impl SessionKeys {
  pub fn new(concept_id: &str) -> Self {
    let prefix = format!("{SESSION_PREFIX}{concept_id}:");
    Self {
      difficulty: format!("{prefix}difficulty"),
      question_type: format!("{prefix}question_type"),
      question_index: format!("{prefix}question_index"),
      history: format!("{prefix}history"),
      prefix,
    }
  }
}

fn step_toward(from: Difficulty, target: Difficulty) -> Option<Difficulty> {
  if target > from {
    from.raise()
  } else if target < from {
    from.lower()
  } else {
    None
  }
}

fn event(from: Difficulty, to: Difficulty, reason: String) -> AdaptationEvent {
  let kind = if to > from { AdaptationKind::Increase } else { AdaptationKind::Decrease };
  AdaptationEvent { kind, from, to, reason }
}

/// The diagnostic recommendation replaces the difficulty, one step at most.
pub fn diagnostic_adaptation(current: Difficulty, recommended: Difficulty) -> Option<AdaptationEvent> {
  let to = step_toward(current, recommended)?;
  let reason = if to < current { DIAGNOSTIC_DECREASE_REASON } else { DIAGNOSTIC_INCREASE_REASON };
  Some(event(current, to, reason.to_string()))
}

/// Score 1 steps down, score 3 steps up, score 2 holds.
pub fn connection_adaptation(current: Difficulty, score: u8, feedback: &str) -> Option<AdaptationEvent> {
  let (to, default_reason) = match score {
    1 => (current.lower()?, CONNECTION_DECREASE_REASON),
    3 => (current.raise()?, CONNECTION_INCREASE_REASON),
    _ => return None,
  };
  let reason = if feedback.trim().is_empty() { default_reason.to_string() } else { feedback.to_string() };
  Some(event(current, to, reason))
}

/// Question for the stage: exact difficulty, else the nearest one in the pool
/// (lower wins a tie), else an open-ended prompt.
pub fn select_question(concept: &Concept, question_type: QuestionType, difficulty: Difficulty) -> Question {
  let Some(pool) = concept.question_pools.for_type(question_type) else {
    return diagnostic_question(concept);
  };
  if let Some(q) = pool.get(&difficulty) {
    return q.clone();
  }
  pool
    .iter()
    .min_by_key(|(d, _)| (d.rank().abs_diff(difficulty.rank()), d.rank()))
    .map(|(_, q)| q.clone())
    .unwrap_or_else(|| open_ended_question(question_type, difficulty))
}
