//! Session controller: owns every live session, routes answers to the grader,
//! applies the adaptation policy and persists after each change.
//!
//! At most one grading call is in flight per session; a second submission while
//! one is outstanding is rejected. Grading and applying run on a detached task, so
//! a dropped request still lands its result and releases the session. Grader
//! failures never end a session: the neutral grade is substituted and the flow
//! continues.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::config::ScoringConfig;
use crate::domain::{Concept, QuestionType};
use crate::error::{GradeError, SessionError};
use crate::grader::{AnalysisRequest, DiagnosticAnalysis, ResponseAnalysis, ResponseGrader};
use crate::profile::Profile;
use crate::protocol::{remediation_text, session_view, RemediationKind, SessionView, SubmitOut};
use crate::session::{Session, SessionKeys, SESSION_PREFIX};
use crate::store::LocalStore;
use crate::summary::compute_summary;

pub struct SessionController {
    inner: Arc<Shared>,
}

struct Shared {
    grader: Arc<dyn ResponseGrader>,
    store: Arc<LocalStore>,
    profile: Arc<RwLock<Profile>>,
    scoring: ScoringConfig,
    sessions: RwLock<HashMap<String, Session>>,
    next_claim: AtomicU64,
}

enum Graded {
    Diagnostic(DiagnosticAnalysis),
    Response(ResponseAnalysis),
}

impl Graded {
    fn neutral(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::Diagnostic => Graded::Diagnostic(DiagnosticAnalysis::neutral()),
            _ => Graded::Response(ResponseAnalysis::neutral()),
        }
    }
}

impl SessionController {
    pub fn new(
        grader: Arc<dyn ResponseGrader>,
        store: Arc<LocalStore>,
        profile: Arc<RwLock<Profile>>,
        scoring: ScoringConfig,
    ) -> Self {
        let inner = Shared {
            grader,
            store,
            profile,
            scoring,
            sessions: RwLock::new(HashMap::new()),
            next_claim: AtomicU64::new(1),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn grader_name(&self) -> &'static str {
        self.inner.grader.name()
    }

    /// Start (or resume) the session for `concept`, picking up persisted state.
    /// A session with a grading call in flight is kept as is.
    #[instrument(level = "info", skip(self, concept), fields(concept = %concept.id))]
    pub async fn initialize(&self, concept: Concept) -> SessionView {
        let inner = &self.inner;
        let mut sessions = inner.sessions.write().await;
        if let Some(live) = sessions.get(&concept.id).filter(|s| s.is_evaluating()) {
            debug!(target: "session", "Grading in flight; keeping the live session");
            return session_view(live);
        }

        let mut session = Session::restore(concept, &inner.store);
        if session.is_complete() {
            session.summary = Some(compute_summary(&session.concept, &session.history, &inner.scoring));
        }
        session.persist(&inner.store);
        let view = session_view(&session);
        info!(
            target: "session",
            difficulty = session.difficulty.as_str(),
            question_type = session.question_type.as_str(),
            answered = session.history.len(),
            "Session initialized"
        );
        sessions.insert(session.concept.id.clone(), session);
        view
    }

    pub async fn view(&self, concept_id: &str) -> Result<SessionView, SessionError> {
        let sessions = self.inner.sessions.read().await;
        let s = sessions.get(concept_id).ok_or_else(|| SessionError::NotStarted(concept_id.to_string()))?;
        Ok(session_view(s))
    }

    #[instrument(level = "info", skip(self, text), fields(answer_len = text.len()))]
    pub async fn submit_answer(&self, concept_id: &str, text: &str) -> Result<SubmitOut, SessionError> {
        let answer = text.trim();
        if answer.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        // Claim the session, snapshot what the grader needs, release the lock.
        let (claim, question_type, concept, request) = {
            let mut sessions = self.inner.sessions.write().await;
            let s = sessions.get_mut(concept_id).ok_or_else(|| SessionError::NotStarted(concept_id.to_string()))?;
            if s.is_complete() {
                return Err(SessionError::Completed(concept_id.to_string()));
            }
            if s.is_evaluating() {
                return Err(SessionError::Busy(concept_id.to_string()));
            }
            let claim = self.inner.next_claim.fetch_add(1, Ordering::Relaxed);
            s.claim = Some(claim);
            let q = &s.current_question;
            let request = AnalysisRequest {
                concept_id: s.concept.id.clone(),
                concept_title: s.concept.title.clone(),
                question_text: q.text.clone(),
                question_type: Some(s.question_type),
                current_difficulty: s.difficulty,
                response: answer.to_string(),
                core_statements: s.concept.core_statements.clone(),
                target_statements: s.concept.statements_at(&q.target_statements),
                expected_key_terms: q.key_terms().to_vec(),
            };
            (claim, s.question_type, s.concept.clone(), request)
        };

        let inner = self.inner.clone();
        let id = concept_id.to_string();
        let owned_answer = answer.to_string();
        let task = tokio::spawn(
            async move {
                let graded = inner.grade(&id, question_type, &owned_answer, concept, request).await;
                inner.apply(&id, claim, &owned_answer, graded).await
            }
            .in_current_span(),
        );
        match task.await {
            Ok(out) => out,
            Err(e) => {
                error!(target: "session", %concept_id, error = %e, "Evaluation task failed");
                self.inner.release(concept_id, claim).await;
                Err(SessionError::Interrupted(concept_id.to_string()))
            }
        }
    }

    pub async fn clear_adaptation(&self, concept_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.inner.sessions.write().await;
        let s = sessions.get_mut(concept_id).ok_or_else(|| SessionError::NotStarted(concept_id.to_string()))?;
        s.adaptation = None;
        Ok(())
    }

    /// Discard the live session and its persisted entries.
    #[instrument(level = "info", skip(self))]
    pub async fn reset(&self, concept_id: &str) {
        self.inner.sessions.write().await.remove(concept_id);
        self.inner.store.remove_prefix(&SessionKeys::new(concept_id).prefix);
    }

    /// Discard every session, live and persisted. Used by the profile "start over".
    pub async fn reset_all(&self) {
        self.inner.sessions.write().await.clear();
        self.inner.store.remove_prefix(SESSION_PREFIX);
    }

    pub async fn remediation(&self, concept_id: &str, kind: RemediationKind) -> Result<Option<String>, SessionError> {
        let sessions = self.inner.sessions.read().await;
        let s = sessions.get(concept_id).ok_or_else(|| SessionError::NotStarted(concept_id.to_string()))?;
        Ok(s.current_question.remediation.as_ref().and_then(|r| remediation_text(r, kind)))
    }
}

impl Shared {
    /// Run the grader on its own task; a failure or a panic yields the neutral grade.
    async fn grade(
        &self,
        concept_id: &str,
        question_type: QuestionType,
        answer: &str,
        concept: Concept,
        request: AnalysisRequest,
    ) -> Graded {
        let grader = self.grader.clone();
        let text = answer.to_string();
        let task = tokio::spawn(
            async move {
                match question_type {
                    QuestionType::Diagnostic => grader.analyze_diagnostic(&text, &concept).await.map(Graded::Diagnostic),
                    _ => grader.analyze_response(&request).await.map(Graded::Response),
                }
            }
            .in_current_span(),
        );
        let result = match task.await {
            Ok(r) => r,
            Err(e) => Err(GradeError::Unavailable(format!("grading task failed: {e}"))),
        };
        result.unwrap_or_else(|e| {
            warn!(target: "session", %concept_id, error = %e, stage = question_type.as_str(), "Grading failed; using neutral result");
            Graded::neutral(question_type)
        })
    }

    /// Apply a grade if `claim` still owns the session.
    async fn apply(&self, concept_id: &str, claim: u64, answer: &str, graded: Graded) -> Result<SubmitOut, SessionError> {
        let mut sessions = self.sessions.write().await;
        let Some(s) = sessions.get_mut(concept_id) else {
            info!(target: "session", %concept_id, "Session reset during grading; result discarded");
            return Err(SessionError::NotStarted(concept_id.to_string()));
        };
        if s.claim != Some(claim) {
            info!(target: "session", %concept_id, "Session restarted during grading; result discarded");
            return Err(SessionError::Superseded(concept_id.to_string()));
        }
        s.claim = None;

        let (score, feedback, misconception, adaptation) = match &graded {
            Graded::Diagnostic(a) => {
                let ev = s.apply_diagnostic(answer, a);
                (a.recommended_difficulty.rank(), a.feedback.clone(), a.misconception.clone(), ev)
            }
            Graded::Response(a) => {
                let ev = s.apply_response(answer, a);
                (a.score.clamp(1, 3), a.feedback.clone(), a.misconception.clone(), ev)
            }
        };

        {
            let mut profile = self.profile.write().await;
            profile.add_xp(&self.store, self.scoring.xp_per_answer);
            if s.is_complete() {
                profile.mark_concept_complete(&self.store, concept_id);
            }
        }
        if s.is_complete() {
            s.summary = Some(compute_summary(&s.concept, &s.history, &self.scoring));
        }
        s.persist(&self.store);

        if let Some(ev) = &adaptation {
            info!(target: "session", %concept_id, from = ev.from.as_str(), to = ev.to.as_str(), "Difficulty adapted");
        }
        if let Some(summary) = &s.summary {
            info!(target: "session", %concept_id, confidence = summary.final_confidence, mastery = ?summary.mastery, "Cycle complete");
        }

        Ok(SubmitOut {
            score,
            feedback,
            misconception,
            adaptation,
            is_complete: s.is_complete(),
            summary: s.summary.clone(),
            session: session_view(s),
        })
    }

    async fn release(&self, concept_id: &str, claim: u64) {
        let mut sessions = self.sessions.write().await;
        if let Some(s) = sessions.get_mut(concept_id).filter(|s| s.claim == Some(claim)) {
            s.claim = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::HeuristicConfig;
    use crate::domain::{AdaptationKind, Difficulty, MasteryLabel};
    use crate::error::GradeError;
    use crate::grader::{HeuristicGrader, FALLBACK_FEEDBACK};
    use crate::seeds::{seed_concepts, SEED_CONCEPT_ID};

    /// Returns scripted grades in order; `None` entries fail.
    struct ScriptedGrader {
        diagnostic: Option<Difficulty>,
        scores: Vec<Option<u8>>,
        calls: AtomicU32,
        delay: Duration,
    }

    #[async_trait]
    impl ResponseGrader for ScriptedGrader {
        fn name(&self) -> &'static str { "scripted" }

        async fn analyze_diagnostic(&self, _text: &str, _concept: &Concept) -> Result<DiagnosticAnalysis, GradeError> {
            tokio::time::sleep(self.delay).await;
            match self.diagnostic {
                Some(d) => Ok(DiagnosticAnalysis { recommended_difficulty: d, feedback: "diag".into(), ..DiagnosticAnalysis::neutral() }),
                None => Err(GradeError::Unavailable("scripted failure".into())),
            }
        }

        async fn analyze_response(&self, _request: &AnalysisRequest) -> Result<ResponseAnalysis, GradeError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            match self.scores.get(i).copied().flatten() {
                Some(score) => Ok(ResponseAnalysis { score, feedback: format!("graded {score}"), ..ResponseAnalysis::neutral() }),
                None => Err(GradeError::Unavailable("scripted failure".into())),
            }
        }
    }

    fn scripted(diagnostic: Option<Difficulty>, scores: Vec<Option<u8>>) -> Arc<dyn ResponseGrader> {
        Arc::new(ScriptedGrader { diagnostic, scores, calls: AtomicU32::new(0), delay: Duration::ZERO })
    }

    fn controller(grader: Arc<dyn ResponseGrader>) -> (SessionController, Arc<LocalStore>, Arc<RwLock<Profile>>) {
        let store = Arc::new(LocalStore::in_memory());
        let profile = Arc::new(RwLock::new(Profile::default()));
        (SessionController::new(grader, store.clone(), profile.clone(), ScoringConfig::default()), store, profile)
    }

    fn concept() -> Concept {
        seed_concepts().remove(0)
    }

    #[tokio::test]
    async fn full_cycle_produces_summary() {
        let (c, _store, profile) = controller(scripted(Some(Difficulty::Intermediate), vec![Some(3), Some(2)]));
        c.initialize(concept()).await;

        let out = c.submit_answer(SEED_CONCEPT_ID, "diagnostic answer").await.unwrap();
        assert_eq!(out.session.question_type, QuestionType::Connection);
        assert!(out.adaptation.is_none());

        let out = c.submit_answer(SEED_CONCEPT_ID, "connection answer").await.unwrap();
        let ev = out.adaptation.unwrap();
        assert_eq!(ev.kind, AdaptationKind::Increase);
        assert_eq!((ev.from, ev.to), (Difficulty::Intermediate, Difficulty::Advanced));
        assert_eq!(out.session.question_type, QuestionType::Application);

        let out = c.submit_answer(SEED_CONCEPT_ID, "application answer").await.unwrap();
        assert!(out.is_complete);
        let summary = out.summary.unwrap();
        // scores [2,3,2]: q_conn_int_1 covers {0,1}, q_app_adv_1 covers {1,2}
        assert_eq!(summary.coverage, 1.0);
        assert!(summary.final_confidence <= 100);
        assert_eq!(summary.final_confidence, 87);
        assert_eq!(summary.mastery, MasteryLabel::Strong);
        assert_eq!(summary.history.len(), 3);

        let p = profile.read().await;
        assert_eq!(p.total_xp, 150);
        assert_eq!(p.completed_concepts, vec![SEED_CONCEPT_ID.to_string()]);

        assert_eq!(
            c.submit_answer(SEED_CONCEPT_ID, "more").await.unwrap_err(),
            SessionError::Completed(SEED_CONCEPT_ID.into())
        );
    }

    #[tokio::test]
    async fn grader_failure_substitutes_neutral_grade() {
        let (c, _, _) = controller(scripted(None, vec![None, None]));
        c.initialize(concept()).await;
        let out = c.submit_answer(SEED_CONCEPT_ID, "diagnostic").await.unwrap();
        assert_eq!(out.feedback, FALLBACK_FEEDBACK);
        assert_eq!(out.session.difficulty, Difficulty::Intermediate);

        let out = c.submit_answer(SEED_CONCEPT_ID, "connection").await.unwrap();
        assert_eq!(out.score, 2);
        assert!(out.adaptation.is_none());
        assert_eq!(out.session.question_type, QuestionType::Application);
    }

    #[tokio::test]
    async fn empty_answer_is_a_noop() {
        let (c, _, profile) = controller(scripted(Some(Difficulty::Basic), vec![]));
        c.initialize(concept()).await;
        assert_eq!(c.submit_answer(SEED_CONCEPT_ID, "   ").await.unwrap_err(), SessionError::EmptyAnswer);
        let v = c.view(SEED_CONCEPT_ID).await.unwrap();
        assert_eq!(v.question_index, 0);
        assert!(v.history.is_empty());
        assert_eq!(profile.read().await.total_xp, 0);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let (c, _, _) = controller(scripted(None, vec![]));
        assert_eq!(c.submit_answer("nope", "x").await.unwrap_err(), SessionError::NotStarted("nope".into()));
        assert!(c.view("nope").await.is_err());
    }

    fn slow(diagnostic: Difficulty, scores: Vec<Option<u8>>) -> Arc<dyn ResponseGrader> {
        Arc::new(ScriptedGrader { diagnostic: Some(diagnostic), scores, calls: AtomicU32::new(0), delay: Duration::from_millis(200) })
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected_while_evaluating() {
        let (c, _, _) = controller(slow(Difficulty::Intermediate, vec![]));
        let c = Arc::new(c);
        c.initialize(concept()).await;

        let first = {
            let c = c.clone();
            tokio::spawn(async move { c.submit_answer(SEED_CONCEPT_ID, "first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(c.view(SEED_CONCEPT_ID).await.unwrap().evaluating);
        assert_eq!(
            c.submit_answer(SEED_CONCEPT_ID, "second").await.unwrap_err(),
            SessionError::Busy(SEED_CONCEPT_ID.into())
        );
        let out = first.await.unwrap().unwrap();
        assert_eq!(out.session.history.len(), 1);
        assert!(!out.session.evaluating);
    }

    #[tokio::test]
    async fn dropped_submission_still_lands_and_releases_the_session() {
        let (c, _, profile) = controller(slow(Difficulty::Basic, vec![Some(2)]));
        c.initialize(concept()).await;

        let cut = tokio::time::timeout(Duration::from_millis(20), c.submit_answer(SEED_CONCEPT_ID, "first")).await;
        assert!(cut.is_err());
        tokio::time::sleep(Duration::from_millis(400)).await;

        let v = c.view(SEED_CONCEPT_ID).await.unwrap();
        assert!(!v.evaluating);
        assert_eq!(v.history.len(), 1);
        assert_eq!(v.question_type, QuestionType::Connection);
        assert_eq!(v.difficulty, Difficulty::Basic);

        let out = c.submit_answer(SEED_CONCEPT_ID, "second").await.unwrap();
        assert_eq!(out.session.question_type, QuestionType::Application);
        assert_eq!(profile.read().await.total_xp, 100);
    }

    #[tokio::test]
    async fn reinitialize_during_grading_keeps_the_live_session() {
        let (c, _, _) = controller(slow(Difficulty::Intermediate, vec![]));
        let c = Arc::new(c);
        c.initialize(concept()).await;

        let first = {
            let c = c.clone();
            tokio::spawn(async move { c.submit_answer(SEED_CONCEPT_ID, "first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let v = c.initialize(concept()).await;
        assert!(v.evaluating);
        assert_eq!(v.question_type, QuestionType::Diagnostic);
        assert_eq!(
            c.submit_answer(SEED_CONCEPT_ID, "second").await.unwrap_err(),
            SessionError::Busy(SEED_CONCEPT_ID.into())
        );

        let out = first.await.unwrap().unwrap();
        let types: Vec<QuestionType> = out.session.history.iter().map(|r| r.question_type).collect();
        assert_eq!(types, vec![QuestionType::Diagnostic]);
        assert_eq!(out.session.question_type, QuestionType::Connection);
    }

    #[tokio::test]
    async fn result_for_a_restarted_session_is_discarded() {
        let (c, store, profile) = controller(slow(Difficulty::Advanced, vec![]));
        let c = Arc::new(c);
        c.initialize(concept()).await;

        let stale = {
            let c = c.clone();
            tokio::spawn(async move { c.submit_answer(SEED_CONCEPT_ID, "before reset").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        c.reset(SEED_CONCEPT_ID).await;
        c.initialize(concept()).await;
        let fresh = {
            let c = c.clone();
            tokio::spawn(async move { c.submit_answer(SEED_CONCEPT_ID, "after reset").await })
        };

        assert_eq!(stale.await.unwrap().unwrap_err(), SessionError::Superseded(SEED_CONCEPT_ID.into()));
        let out = fresh.await.unwrap().unwrap();
        assert_eq!(out.session.history.len(), 1);
        assert_eq!(out.session.history[0].answer, "after reset");
        assert_eq!(profile.read().await.total_xp, 50);

        let restored = Session::restore(concept(), &store);
        assert_eq!(restored.history.len(), 1);
        assert_eq!(restored.question_type, QuestionType::Connection);
    }

    #[tokio::test]
    async fn state_survives_controller_restart_and_reset_clears_it() {
        let store = Arc::new(LocalStore::in_memory());
        let profile = Arc::new(RwLock::new(Profile::default()));
        let make = || {
            SessionController::new(
                scripted(Some(Difficulty::Advanced), vec![]),
                store.clone(),
                profile.clone(),
                ScoringConfig::default(),
            )
        };

        let c = make();
        c.initialize(concept()).await;
        c.submit_answer(SEED_CONCEPT_ID, "I know a lot").await.unwrap();

        let c = make();
        let v = c.initialize(concept()).await;
        assert_eq!(v.difficulty, Difficulty::Advanced);
        assert_eq!(v.question_type, QuestionType::Connection);
        assert_eq!(v.history.len(), 1);

        c.reset(SEED_CONCEPT_ID).await;
        assert!(c.view(SEED_CONCEPT_ID).await.is_err());
        let v = c.initialize(concept()).await;
        assert_eq!(v.question_type, QuestionType::Diagnostic);
        assert!(v.history.is_empty());
    }

    #[tokio::test]
    async fn heuristic_grader_drives_a_real_cycle() {
        let grader = Arc::new(HeuristicGrader::new(HeuristicConfig {
            diagnostic_delay_ms: 0,
            response_delay_ms: 0,
            ..Default::default()
        }));
        let (c, _, _) = controller(grader);
        c.initialize(concept()).await;
        c.submit_answer(SEED_CONCEPT_ID, "no idea").await.unwrap();
        assert_eq!(c.view(SEED_CONCEPT_ID).await.unwrap().difficulty, Difficulty::Basic);

        let out = c
            .submit_answer(
                SEED_CONCEPT_ID,
                "It works like a filter because the environment lets only traits that help animals survive pass on",
            )
            .await
            .unwrap();
        assert_eq!(out.score, 3);
        let ev = out.adaptation.unwrap();
        assert_eq!((ev.from, ev.to), (Difficulty::Basic, Difficulty::Intermediate));
        assert_eq!(out.session.current_question.id, "q_app_int_1");
    }

    #[tokio::test]
    async fn remediation_follows_current_question() {
        let (c, _, _) = controller(scripted(Some(Difficulty::Basic), vec![]));
        c.initialize(concept()).await;
        let hint = c.remediation(SEED_CONCEPT_ID, RemediationKind::Hint).await.unwrap().unwrap();
        assert!(hint.starts_with("There's no right or wrong answer"));
        c.submit_answer(SEED_CONCEPT_ID, "x").await.unwrap();
        let simple = c.remediation(SEED_CONCEPT_ID, RemediationKind::Simplify).await.unwrap().unwrap();
        assert!(simple.contains("sieve"));
        c.clear_adaptation(SEED_CONCEPT_ID).await.unwrap();
        assert!(c.view(SEED_CONCEPT_ID).await.unwrap().adaptation.is_none());
    }
}
