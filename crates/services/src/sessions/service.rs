use chrono::{DateTime, Utc};
use std::fmt;

use exam_core::model::{
    AnswerMap, EXAM_DURATION_SECS, FlagSet, OPTION_COUNT, PerformanceAnalysis, PracticeSnapshot,
    Question, QuestionId, ScoreReport, SessionMode, SessionPhase, ThemeFilter,
};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Movement of the question pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    To(usize),
}

/// Size of the active subset after a theme filter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Active { len: usize },
    /// No question matches; index-based operations fail until the filter changes.
    Empty,
}

/// Result of asking to finish an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Exam attempts wait for confirmation and list what still needs attention.
    ReviewPending {
        unanswered: Vec<QuestionId>,
        flagged: Vec<QuestionId>,
    },
    Completed(ScoreReport),
}

/// Result of a single timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick did not apply: untimed, completed, or already at zero.
    Idle,
    Running { remaining: u32 },
    TimedOut(ScoreReport),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One practice or exam attempt over a read-only question bank.
///
/// The theme filter selects an ordered subset of the bank; the pointer, answers
/// and flags refer to that subset by question id. Every operation runs to
/// completion synchronously; persistence and timing live in the services that
/// drive the session.
pub struct ExamSession {
    mode: SessionMode,
    phase: SessionPhase,
    bank: Vec<Question>,
    filter: ThemeFilter,
    active: Vec<usize>,
    current: usize,
    answers: AnswerMap,
    flagged: FlagSet,
    time_remaining: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    timed_out: bool,
}

impl ExamSession {
    /// Start a fresh attempt.
    ///
    /// Exam attempts get the full time budget; practice attempts are untimed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no question matches the filter.
    pub fn start(
        mode: SessionMode,
        bank: Vec<Question>,
        filter: ThemeFilter,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let active = select(&bank, &filter);
        if active.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            mode,
            phase: SessionPhase::InProgress,
            bank,
            filter,
            active,
            current: 0,
            answers: AnswerMap::new(),
            flagged: FlagSet::new(),
            time_remaining: if mode.is_timed() { EXAM_DURATION_SECS } else { 0 },
            started_at,
            completed_at: None,
            timed_out: false,
        })
    }

    /// Rebuild a practice attempt from a persisted snapshot.
    ///
    /// The pointer is clamped to the active subset if the bank shrank since the
    /// snapshot was taken. Answers for questions that no longer exist are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if the snapshot's themes match nothing.
    pub fn resume(
        bank: Vec<Question>,
        snapshot: PracticeSnapshot,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::start(
            SessionMode::Practice,
            bank,
            snapshot.selected_themes,
            started_at,
        )?;
        session.answers = snapshot
            .answers
            .into_iter()
            .filter(|(id, option)| *option < OPTION_COUNT && session.bank_contains(*id))
            .collect();
        session.current = snapshot.current_index.min(session.active.len() - 1);
        Ok(session)
    }

    /// Reapply flags saved outside the practice snapshot, keeping only ids
    /// that are still in the bank.
    pub fn restore_flags(&mut self, flags: FlagSet) {
        self.flagged = flags
            .into_iter()
            .filter(|id| self.bank_contains(*id))
            .collect();
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn filter(&self) -> &ThemeFilter {
        &self.filter
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn flagged(&self) -> &FlagSet {
        &self.flagged
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<usize> {
        self.answers.get(&id).copied()
    }

    #[must_use]
    pub fn is_flagged(&self, id: QuestionId) -> bool {
        self.flagged.contains(&id)
    }

    /// Seconds left on the exam clock; always 0 in practice mode.
    #[must_use]
    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    /// Seconds of exam time consumed so far.
    #[must_use]
    pub fn elapsed_ticks(&self) -> u32 {
        if self.mode.is_timed() {
            EXAM_DURATION_SECS - self.time_remaining
        } else {
            0
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// True when the attempt ended because the clock ran out.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Whether the timer should be running for this session right now.
    #[must_use]
    pub fn needs_ticks(&self) -> bool {
        self.mode.is_timed() && !self.is_complete() && self.time_remaining > 0
    }

    /// Number of questions in the active subset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Pointer into the active subset, or `None` when the subset is empty.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        (!self.active.is_empty()).then_some(self.current)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.question_at(self.current)
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.active.get(index).map(|&pos| &self.bank[pos])
    }

    /// Active questions in bank order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> + '_ {
        self.active.iter().map(|&pos| &self.bank[pos])
    }

    /// Whether the question at `index` has been answered, the precondition for
    /// moving forward from it or finishing. Not enforced by the session itself.
    #[must_use]
    pub fn can_advance(&self, index: usize) -> bool {
        self.question_at(index)
            .is_some_and(|q| self.answers.contains_key(&q.id()))
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            position: self.current_index().map_or(0, |idx| idx + 1),
            total: self.len(),
            answered: self
                .questions()
                .filter(|q| self.answers.contains_key(&q.id()))
                .count(),
            flagged: self
                .questions()
                .filter(|q| self.flagged.contains(&q.id()))
                .count(),
            is_complete: self.is_complete(),
        }
    }

    /// Record the chosen option, overwriting any earlier choice.
    ///
    /// Practice call sites that lock a question after the first answer must
    /// check [`Self::answer_for`] themselves.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidOption` for an index outside `0..4`,
    /// `SessionError::UnknownQuestion` for an id outside the active subset, and
    /// a phase error when the session is not in progress.
    pub fn answer(&mut self, id: QuestionId, option: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if option >= OPTION_COUNT {
            return Err(SessionError::InvalidOption { index: option });
        }
        if !self.questions().any(|q| q.id() == id) {
            return Err(SessionError::UnknownQuestion(id));
        }
        self.answers.insert(id, option);
        Ok(())
    }

    /// Answer the question under the pointer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::answer`], plus `SessionError::Empty` when nothing is active.
    pub fn answer_current(&mut self, option: usize) -> Result<QuestionId, SessionError> {
        let id = self.current_question().ok_or(SessionError::Empty)?.id();
        self.answer(id, option)?;
        Ok(id)
    }

    /// Flip the review flag of a question and return whether it is now flagged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` for an id outside the bank, and a
    /// phase error when the session is not in progress.
    pub fn toggle_flag(&mut self, id: QuestionId) -> Result<bool, SessionError> {
        self.ensure_in_progress()?;
        if !self.bank_contains(id) {
            return Err(SessionError::UnknownQuestion(id));
        }
        if self.flagged.remove(&id) {
            Ok(false)
        } else {
            self.flagged.insert(id);
            Ok(true)
        }
    }

    /// Move the pointer and return the new index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no question is active,
    /// `SessionError::OutOfBounds` if the target is outside the active subset,
    /// and a phase error when the session is not in progress.
    pub fn navigate(&mut self, to: Navigation) -> Result<usize, SessionError> {
        self.ensure_in_progress()?;
        let len = self.active.len();
        if len == 0 {
            return Err(SessionError::Empty);
        }
        let target = match to {
            Navigation::Next => self.current + 1,
            Navigation::Previous => self
                .current
                .checked_sub(1)
                .ok_or(SessionError::OutOfBounds { index: 0, len })?,
            Navigation::To(index) => index,
        };
        if target >= len {
            return Err(SessionError::OutOfBounds { index: target, len });
        }
        self.current = target;
        Ok(target)
    }

    /// Replace the theme filter and recompute the active subset.
    ///
    /// The pointer is clamped into the new subset.
    ///
    /// # Errors
    ///
    /// Returns a phase error when the session is not in progress.
    pub fn set_theme_filter(&mut self, filter: ThemeFilter) -> Result<Selection, SessionError> {
        self.ensure_in_progress()?;
        self.active = select(&self.bank, &filter);
        self.filter = filter;
        match self.active.len() {
            0 => {
                self.current = 0;
                Ok(Selection::Empty)
            }
            len => {
                self.current = self.current.min(len - 1);
                Ok(Selection::Active { len })
            }
        }
    }

    /// Ask to finish the attempt.
    ///
    /// Practice attempts complete immediately. Exam attempts move to review and
    /// must be confirmed; asking again while in review repeats the review lists.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the attempt is already over.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<FinishOutcome, SessionError> {
        match (self.phase, self.mode) {
            (SessionPhase::Completed, _) => Err(SessionError::Completed),
            (_, SessionMode::Practice) => Ok(FinishOutcome::Completed(self.complete(now, false))),
            (_, SessionMode::Exam) => {
                self.phase = SessionPhase::ReviewPending;
                Ok(FinishOutcome::ReviewPending {
                    unanswered: self.unanswered(),
                    flagged: self
                        .questions()
                        .map(Question::id)
                        .filter(|id| self.flagged.contains(id))
                        .collect(),
                })
            }
        }
    }

    /// Complete an exam attempt that is awaiting confirmation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotReviewPending` unless [`Self::finish`] moved the
    /// attempt to review.
    pub fn confirm_finish(&mut self, now: DateTime<Utc>) -> Result<ScoreReport, SessionError> {
        if self.phase != SessionPhase::ReviewPending {
            return Err(SessionError::NotReviewPending);
        }
        Ok(self.complete(now, false))
    }

    /// Leave review and keep working on the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotReviewPending` unless the attempt is in review.
    pub fn cancel_finish(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::ReviewPending {
            return Err(SessionError::NotReviewPending);
        }
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Advance the exam clock by one second.
    ///
    /// Reaching zero completes the attempt without a review step. Ticks on an
    /// untimed, completed or expired session change nothing.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.needs_ticks() {
            return TickOutcome::Idle;
        }
        self.time_remaining -= 1;
        if self.time_remaining == 0 {
            TickOutcome::TimedOut(self.complete(now, true))
        } else {
            TickOutcome::Running {
                remaining: self.time_remaining,
            }
        }
    }

    /// Score over the active subset. Pure: repeated calls give the same result.
    #[must_use]
    pub fn score(&self) -> ScoreReport {
        ScoreReport::compute(self.questions(), &self.answers)
    }

    /// Missed questions and per-theme accuracy over the active subset.
    #[must_use]
    pub fn analysis(&self) -> PerformanceAnalysis {
        PerformanceAnalysis::compute(self.questions(), &self.answers)
    }

    /// Ids of active questions without an answer, in order.
    #[must_use]
    pub fn unanswered(&self) -> Vec<QuestionId> {
        self.questions()
            .map(Question::id)
            .filter(|id| !self.answers.contains_key(id))
            .collect()
    }

    /// State needed to resume this attempt later.
    #[must_use]
    pub fn snapshot(&self) -> PracticeSnapshot {
        PracticeSnapshot {
            current_index: self.current,
            answers: self.answers.clone(),
            selected_themes: self.filter.clone(),
        }
    }

    fn complete(&mut self, now: DateTime<Utc>, timed_out: bool) -> ScoreReport {
        self.phase = SessionPhase::Completed;
        self.completed_at = Some(now);
        self.timed_out = timed_out;
        self.score()
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::ReviewPending => Err(SessionError::NotInProgress),
            SessionPhase::Completed => Err(SessionError::Completed),
        }
    }

    fn bank_contains(&self, id: QuestionId) -> bool {
        self.bank.iter().any(|q| q.id() == id)
    }
}

fn select(bank: &[Question], filter: &ThemeFilter) -> Vec<usize> {
    bank.iter()
        .enumerate()
        .filter(|(_, q)| filter.matches(q.theme()))
        .map(|(pos, _)| pos)
        .collect()
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("bank_len", &self.bank.len())
            .field("active_len", &self.active.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("flagged_len", &self.flagged.len())
            .field("time_remaining", &self.time_remaining)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
