//! Cycle summary: coverage, consistency and depth folded into one 0–100 confidence.
//!
//!   coverage    = |target statements hit by answers scoring ≥ 2| / |core statements|  (1 if none)
//!   consistency = 1 - (max - min) / 3
//!   depth       = max / 3
//!   confidence  = round((coverage·wc + consistency·wn + depth·wd) · 100)
//!
//! Weights come from `ScoringConfig` (30/40/30 by default).

use std::collections::BTreeSet;

use crate::config::ScoringConfig;
use crate::domain::{AnswerRecord, Concept, CycleSummary, Difficulty, MasteryLabel, Trajectory};

pub fn coverage(concept: &Concept, history: &[AnswerRecord]) -> f64 {
  let total = concept.core_statements.len();
  if total == 0 {
    return 1.0;
  }
  let covered: BTreeSet<usize> = history
    .iter()
    .filter(|r| r.score >= 2)
    .flat_map(|r| r.question.target_statements.iter().copied())
    .filter(|i| *i < total)
    .collect();
  covered.len() as f64 / total as f64
}

pub fn consistency(history: &[AnswerRecord]) -> f64 {
  let (Some(max), Some(min)) = (history.iter().map(|r| r.score).max(), history.iter().map(|r| r.score).min()) else {
    return 1.0;
  };
  1.0 - f64::from(max - min) / 3.0
}

pub fn depth(history: &[AnswerRecord]) -> f64 {
  history.iter().map(|r| r.score).max().map(|m| f64::from(m) / 3.0).unwrap_or(0.0)
}

/// >80 Strong, >50 Developing, else Starting.
pub fn mastery_label(confidence: u8) -> MasteryLabel {
  if confidence > 80 {
    MasteryLabel::Strong
  } else if confidence > 50 {
    MasteryLabel::Developing
  } else {
    MasteryLabel::Starting
  }
}

pub fn final_confidence(coverage: f64, consistency: f64, depth: f64, w: &ScoringConfig) -> u8 {
  let raw = (coverage * w.coverage_weight + consistency * w.consistency_weight + depth * w.depth_weight) * 100.0;
  raw.round().clamp(0.0, 100.0) as u8
}

pub fn trajectory(history: &[AnswerRecord]) -> Trajectory {
  let path: Vec<Difficulty> = history.iter().map(|r| r.difficulty).collect();
  Trajectory {
    start: path.first().copied().unwrap_or_default(),
    end: path.last().copied().unwrap_or_default(),
    path,
  }
}

pub fn compute_summary(concept: &Concept, history: &[AnswerRecord], weights: &ScoringConfig) -> CycleSummary {
  let coverage = coverage(concept, history);
  let consistency = consistency(history);
  let depth = depth(history);
  let final_confidence = final_confidence(coverage, consistency, depth, weights);
  CycleSummary {
    concept_id: concept.id.clone(),
    concept_title: concept.title.clone(),
    final_confidence,
    mastery: mastery_label(final_confidence),
    coverage,
    consistency,
    depth,
    xp_earned: weights.xp_per_answer.saturating_mul(history.len() as u32),
    trajectory: trajectory(history),
    history: history.to_vec(),
  }
}
