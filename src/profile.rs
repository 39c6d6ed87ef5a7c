//! Learner profile: display name, study material, experience points and
//! completed concepts. Each field is its own store entry.

use serde::Serialize;

use crate::store::LocalStore;

const USER_NAME: &str = "masterit:profile:user_name";
const STUDY_MATERIAL: &str = "masterit:profile:study_material";
const TOTAL_XP: &str = "masterit:profile:total_xp";
const COMPLETED: &str = "masterit:profile:completed_concepts";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub user_name: String,
  pub study_material: String,
  pub total_xp: u32,
  pub completed_concepts: Vec<String>,
}

impl Profile {
  pub fn load(store: &LocalStore) -> Self {
    Self {
      user_name: store.get(USER_NAME).unwrap_or_default(),
      study_material: store.get(STUDY_MATERIAL).unwrap_or_default(),
      total_xp: store.get_json(TOTAL_XP).unwrap_or(0),
      completed_concepts: store.get_json(COMPLETED).unwrap_or_default(),
    }
  }

  pub fn set_user_name(&mut self, store: &LocalStore, name: &str) {
    self.user_name = name.trim().to_string();
    store.set(USER_NAME, self.user_name.clone());
  }

  pub fn set_study_material(&mut self, store: &LocalStore, text: &str) {
    self.study_material = text.to_string();
    store.set(STUDY_MATERIAL, self.study_material.clone());
  }

  pub fn add_xp(&mut self, store: &LocalStore, amount: u32) {
    self.total_xp = self.total_xp.saturating_add(amount);
    store.set_json(TOTAL_XP, &self.total_xp);
  }

  /// Adds the concept once; repeated completions are ignored.
  pub fn mark_concept_complete(&mut self, store: &LocalStore, concept_id: &str) {
    if self.completed_concepts.iter().any(|c| c == concept_id) {
      return;
    }
    self.completed_concepts.push(concept_id.to_string());
    store.set_json(COMPLETED, &self.completed_concepts);
  }

  /// Start over: clears every profile field.
  pub fn reset(&mut self, store: &LocalStore) {
    *self = Profile::default();
    for key in [USER_NAME, STUDY_MATERIAL, TOTAL_XP, COMPLETED] {
      store.remove(key);
    }
  }
}
