//! Application state: concept catalogue, profile, local store, session controller,
//! prompts and the optional OpenAI client.
//!
//! The grading strategy is picked here once, from `MASTERIT_USE_REAL_AI`, and
//! never changes for the life of the process.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::{load_agent_config_from_env, AgentConfig, Prompts, Settings};
use crate::controller::SessionController;
use crate::domain::Concept;
use crate::grader::build_grader;
use crate::openai::OpenAI;
use crate::profile::Profile;
use crate::seeds::seed_concepts;
use crate::store::LocalStore;

#[derive(Clone)]
pub struct AppState {
    pub concepts: Arc<RwLock<Vec<Concept>>>,
    pub profile: Arc<RwLock<Profile>>,
    pub store: Arc<LocalStore>,
    pub sessions: Arc<SessionController>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config, open the store, init OpenAI, pick the grader.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();
        let settings = Settings::from_env();
        let store = match &settings.data_dir {
            Some(dir) => LocalStore::open(dir),
            None => {
                info!(target: "masterit_backend", "MASTERIT_DATA_DIR not set; persistence is in-memory only.");
                LocalStore::in_memory()
            }
        };

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "masterit_backend", base_url = %oa.base_url, eval_model = %oa.eval_model, curriculum_model = %oa.curriculum_model, chat_model = %oa.chat_model, "OpenAI enabled.");
        } else {
            info!(target: "masterit_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local logic.");
        }

        Self::from_parts(cfg, &settings, openai, store)
    }

    /// Assemble state from already-resolved parts.
    pub fn from_parts(cfg: AgentConfig, settings: &Settings, openai: Option<OpenAI>, store: LocalStore) -> Self {
        let store = Arc::new(store);
        let profile = Arc::new(RwLock::new(Profile::load(&store)));
        let grader = build_grader(settings.grading_mode, openai.clone(), &cfg.prompts, &cfg.heuristic);
        let sessions = Arc::new(SessionController::new(grader, store.clone(), profile.clone(), cfg.scoring.clone()));

        let concepts = if cfg.concepts.is_empty() { seed_concepts() } else { cfg.concepts };
        info!(target: "masterit_backend", concepts = concepts.len(), "Startup concept catalogue");

        Self {
            concepts: Arc::new(RwLock::new(concepts)),
            profile,
            store,
            sessions,
            openai,
            prompts: cfg.prompts,
        }
    }

    /// Read-only access to a concept by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_concept(&self, id: &str) -> Option<Concept> {
        self.concepts.read().await.iter().find(|c| c.id == id).cloned()
    }

    pub async fn replace_concepts(&self, concepts: Vec<Concept>) {
        *self.concepts.write().await = concepts;
    }
}

#[cfg(test)]
impl AppState {
    /// Heuristic grading without simulated latency, in-memory store.
    pub fn for_tests(openai: Option<OpenAI>) -> Self {
        let mut cfg = AgentConfig::default();
        cfg.heuristic.diagnostic_delay_ms = 0;
        cfg.heuristic.response_delay_ms = 0;
        let settings = Settings { grading_mode: crate::config::GradingMode::Heuristic, data_dir: None };
        Self::from_parts(cfg, &settings, openai, LocalStore::in_memory())
    }
}
