//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - One-shot grading (/api/evaluate) with the neutral fallback
//!   - Curriculum generation, which replaces the concept catalogue on success
//!   - Session start and remediation lookup by concept id
//!   - Profile updates and "start over"

use tracing::{error, info, instrument, warn};

use crate::curriculum;
use crate::domain::Concept;
use crate::error::SessionError;
use crate::profile::Profile;
use crate::protocol::{EvaluateIn, Evaluation, ProfileIn, RemediationKind, SessionView};
use crate::state::AppState;

pub const NO_HELP_AVAILABLE: &str = "No help available for this question.";

#[instrument(level = "info", skip(state, input), fields(concept = %input.concept, answer_len = input.answer.len()))]
pub async fn do_evaluate(state: &AppState, input: &EvaluateIn) -> Evaluation {
  let Some(oa) = &state.openai else {
    warn!(target: "grader", "OPENAI_API_KEY not set; serving neutral evaluation");
    return Evaluation::neutral();
  };
  match oa.evaluate(&state.prompts, input).await {
    Ok(e) => e,
    Err(e) => {
      error!(target: "grader", error = %e, "OpenAI evaluate failed; serving neutral evaluation");
      Evaluation::neutral()
    }
  }
}

/// Saves the text as study material, then tries to build a new catalogue from it.
/// On any failure the current catalogue is returned unchanged.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn do_generate_concepts(state: &AppState, text: &str) -> Vec<Concept> {
  state.profile.write().await.set_study_material(&state.store, text);

  match &state.openai {
    Some(oa) => match curriculum::generate(oa, &state.prompts, text).await {
      Ok(concepts) if !concepts.is_empty() => {
        info!(target: "curriculum", concepts = concepts.len(), "Concept catalogue replaced");
        state.replace_concepts(concepts).await;
      }
      Ok(_) => warn!(target: "curriculum", "Curriculum came back empty; keeping current catalogue"),
      Err(e) => error!(target: "curriculum", error = %e, "Curriculum generation failed; keeping current catalogue"),
    },
    None => error!(target: "curriculum", "OPENAI_API_KEY not set; keeping current catalogue"),
  }
  state.concepts.read().await.clone()
}

#[instrument(level = "info", skip(state), fields(%concept_id))]
pub async fn start_session(state: &AppState, concept_id: &str) -> Result<SessionView, SessionError> {
  let concept = state
    .get_concept(concept_id)
    .await
    .ok_or_else(|| SessionError::UnknownConcept(concept_id.to_string()))?;
  Ok(state.sessions.initialize(concept).await)
}

pub async fn remediation_for(state: &AppState, concept_id: &str, kind: RemediationKind) -> Result<String, SessionError> {
  let text = state.sessions.remediation(concept_id, kind).await?;
  Ok(text.unwrap_or_else(|| NO_HELP_AVAILABLE.to_string()))
}

pub async fn update_profile(state: &AppState, input: &ProfileIn) -> Profile {
  let mut profile = state.profile.write().await;
  if let Some(name) = &input.user_name {
    profile.set_user_name(&state.store, name);
  }
  if let Some(text) = &input.study_material {
    profile.set_study_material(&state.store, text);
  }
  profile.clone()
}

/// Start over: profile fields and every session are discarded.
#[instrument(level = "info", skip(state))]
pub async fn reset_profile(state: &AppState) -> Profile {
  state.sessions.reset_all().await;
  let mut profile = state.profile.write().await;
  profile.reset(&state.store);
  profile.clone()
}
