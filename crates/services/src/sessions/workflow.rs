use std::sync::Arc;

use exam_core::model::{
    AttemptId, AttemptRecord, PracticeSnapshot, QuestionId, ScoreReport, SessionMode, ThemeFilter,
};
use storage::repository::QuestionRepository;

use super::service::{ExamSession, FinishOutcome, Navigation, Selection, TickOutcome};
use super::store::SessionStore;
use crate::Clock;
use crate::error::SessionLoopError;

/// Orchestrates sessions: loads the question bank, applies operations and
/// persists the resulting state after every mutation.
///
/// Persistence is best effort (see [`SessionStore`]); only validation and
/// question-bank failures reach the caller.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    store: SessionStore,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>, store: SessionStore) -> Self {
        Self {
            clock,
            questions,
            store,
        }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Persisted practice attempt that can be offered for resumption.
    pub async fn pending_practice(&self) -> Option<PracticeSnapshot> {
        self.store.load_practice().await
    }

    /// Start a fresh attempt.
    ///
    /// Starting practice discards any stale resumption state.
    ///
    /// # Errors
    ///
    /// Returns `SessionLoopError::Storage` if the question bank cannot be
    /// loaded and `SessionLoopError::Session` if nothing matches the filter.
    pub async fn start(
        &self,
        mode: SessionMode,
        filter: ThemeFilter,
    ) -> Result<ExamSession, SessionLoopError> {
        let bank = self.questions.list_questions().await?;
        let session = ExamSession::start(mode, bank, filter, self.clock.now())?;
        if mode == SessionMode::Practice {
            self.store.clear_practice().await;
        }
        tracing::info!(
            mode = %mode,
            questions = session.len(),
            "session started"
        );
        self.persist(&session).await;
        Ok(session)
    }

    /// Start practice, resuming the persisted attempt when `resume` is true.
    /// A resumed attempt also picks up the flags from the answer book.
    ///
    /// Declining, a missing snapshot, or a snapshot whose themes no longer
    /// match anything all start fresh with `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::start`].
    pub async fn start_practice(
        &self,
        resume: bool,
        filter: ThemeFilter,
    ) -> Result<ExamSession, SessionLoopError> {
        let snapshot = if resume {
            self.store.load_practice().await
        } else {
            None
        };
        if let Some(snapshot) = snapshot {
            let bank = self.questions.list_questions().await?;
            match ExamSession::resume(bank, snapshot, self.clock.now()) {
                Ok(mut session) => {
                    let (_, flagged) = self.store.load_answer_book().await;
                    session.restore_flags(flagged);
                    tracing::info!(
                        current = session.current_index().unwrap_or_default(),
                        answered = session.answers().len(),
                        flagged = session.flagged().len(),
                        "practice resumed"
                    );
                    self.persist(&session).await;
                    return Ok(session);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "persisted practice cannot be resumed");
                }
            }
        }
        self.start(SessionMode::Practice, filter).await
    }

    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` if the session rejects the answer.
    pub async fn answer(
        &self,
        session: &mut ExamSession,
        id: QuestionId,
        option: usize,
    ) -> Result<(), SessionLoopError> {
        session.answer(id, option)?;
        self.persist(session).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` if the session rejects the flag.
    pub async fn toggle_flag(
        &self,
        session: &mut ExamSession,
        id: QuestionId,
    ) -> Result<bool, SessionLoopError> {
        let flagged = session.toggle_flag(id)?;
        self.persist(session).await;
        Ok(flagged)
    }

    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` if the move is out of bounds.
    pub async fn navigate(
        &self,
        session: &mut ExamSession,
        to: Navigation,
    ) -> Result<usize, SessionLoopError> {
        let index = session.navigate(to)?;
        self.persist(session).await;
        Ok(index)
    }

    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` when the session is not in progress.
    pub async fn set_theme_filter(
        &self,
        session: &mut ExamSession,
        filter: ThemeFilter,
    ) -> Result<Selection, SessionLoopError> {
        let selection = session.set_theme_filter(filter)?;
        if selection == Selection::Empty {
            tracing::info!("theme filter matches no questions");
        }
        self.persist(session).await;
        Ok(selection)
    }

    /// Ask to finish; completes practice immediately, moves exams to review.
    ///
    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` if the attempt is already complete.
    pub async fn finish(&self, session: &mut ExamSession) -> Result<FinishOutcome, SessionLoopError> {
        let outcome = session.finish(self.clock.now())?;
        match &outcome {
            FinishOutcome::Completed(report) => self.on_completed(session, *report).await,
            FinishOutcome::ReviewPending {
                unanswered,
                flagged,
            } => tracing::info!(
                unanswered = unanswered.len(),
                flagged = flagged.len(),
                "exam awaiting confirmation"
            ),
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` unless the exam awaits confirmation.
    pub async fn confirm_finish(
        &self,
        session: &mut ExamSession,
    ) -> Result<ScoreReport, SessionLoopError> {
        let report = session.confirm_finish(self.clock.now())?;
        self.on_completed(session, report).await;
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns `SessionLoopError::Session` unless the exam awaits confirmation.
    pub fn cancel_finish(&self, session: &mut ExamSession) -> Result<(), SessionLoopError> {
        session.cancel_finish()?;
        Ok(())
    }

    /// Apply one timer tick, recording the attempt if the clock ran out.
    pub async fn tick(&self, session: &mut ExamSession) -> TickOutcome {
        let outcome = session.tick(self.clock.now());
        if let TickOutcome::TimedOut(report) = outcome {
            tracing::info!(score = report.score, total = report.total, "exam timed out");
            self.on_completed(session, report).await;
        }
        outcome
    }

    /// Completed attempts, oldest first.
    pub async fn history(&self) -> Vec<AttemptRecord> {
        self.store.load_history().await
    }

    // A practice snapshot is only worth offering once something is answered.
    async fn persist(&self, session: &ExamSession) {
        if session.mode() == SessionMode::Practice
            && !session.is_complete()
            && !session.answers().is_empty()
        {
            self.store.save_practice(&session.snapshot()).await;
        }
        self.store
            .save_answer_book(session.answers(), session.flagged())
            .await;
    }

    async fn on_completed(&self, session: &ExamSession, report: ScoreReport) {
        tracing::info!(
            mode = %session.mode(),
            score = report.score,
            total = report.total,
            percentage = report.percentage,
            "session completed"
        );
        match session.mode() {
            SessionMode::Practice => self.store.clear_practice().await,
            SessionMode::Exam => {
                let record = AttemptRecord {
                    id: AttemptId::generate(),
                    mode: session.mode(),
                    started_at: session.started_at(),
                    completed_at: session.completed_at().unwrap_or_else(|| self.clock.now()),
                    score: report,
                    timed_out: session.timed_out(),
                    themes: session.filter().clone(),
                };
                self.store.append_history(record).await;
            }
        }
    }
}
