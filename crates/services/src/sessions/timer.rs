use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::service::ExamSession;

/// Cadence of the exam clock.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Single repeating task that emits one tick per period.
///
/// The task only signals; the owner of the session applies each tick, so the
/// session is never mutated from the background. Starting replaces any running
/// task and dropping the timer cancels it.
#[derive(Debug, Default)]
pub struct ExamTimer {
    handle: Option<JoinHandle<()>>,
}

impl ExamTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking and return the receiving end of the tick channel.
    ///
    /// The first tick arrives one period after the call.
    pub fn start(&mut self, period: Duration) -> mpsc::Receiver<()> {
        self.cancel();
        let (tx, rx) = mpsc::channel(1);
        self.handle = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if tx.send(()).await.is_err() {
                    tracing::debug!("exam timer receiver dropped");
                    break;
                }
            }
        }));
        tracing::debug!(period_ms = period.as_millis(), "exam timer started");
        rx
    }

    /// Stop the task. Safe to call when nothing is running.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("exam timer cancelled");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Align the timer with the session state.
    ///
    /// Starts ticking (returning a new receiver) when the session needs ticks and
    /// nothing is running; cancels whenever the session leaves the timed state.
    pub fn sync_with(&mut self, session: &ExamSession) -> Option<mpsc::Receiver<()>> {
        if session.needs_ticks() {
            if self.is_running() {
                None
            } else {
                Some(self.start(TICK_PERIOD))
            }
        } else {
            self.cancel();
            None
        }
    }
}

impl Drop for ExamTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{
        EXAM_DURATION_SECS, QuestionDraft, QuestionId, SessionMode, ThemeFilter,
    };
    use exam_core::time::fixed_now;

    use crate::sessions::TickOutcome;

    fn exam(mode: SessionMode) -> ExamSession {
        let bank = vec![
            QuestionDraft::new("General", "Q")
                .with_options(["a", "b", "c", "d"])
                .validate()
                .unwrap()
                .assign_id(QuestionId::new(1)),
        ];
        ExamSession::start(mode, bank, ThemeFilter::all(), fixed_now()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_arrive_once_per_period() {
        let mut timer = ExamTimer::new();
        let mut rx = timer.start(TICK_PERIOD);
        let started = Instant::now();

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        assert_eq!(started.elapsed(), TICK_PERIOD * 3);
        assert!(timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_to_zero_completes_and_stops_timer() {
        let mut session = exam(SessionMode::Exam);
        let mut timer = ExamTimer::new();
        let mut rx = timer.sync_with(&session).unwrap();

        let mut outcome = TickOutcome::Idle;
        while session.needs_ticks() {
            rx.recv().await.unwrap();
            outcome = session.tick(fixed_now());
            timer.sync_with(&session);
        }

        assert!(matches!(outcome, TickOutcome::TimedOut(_)));
        assert!(session.is_complete());
        assert!(!timer.is_running());
        assert_eq!(session.time_remaining(), 0);
        assert_eq!(session.tick(fixed_now()), TickOutcome::Idle);
        assert_eq!(session.elapsed_ticks(), EXAM_DURATION_SECS);
    }

    #[tokio::test(start_paused = true)]
    async fn practice_sessions_never_start_the_timer() {
        let session = exam(SessionMode::Practice);
        let mut timer = ExamTimer::new();
        assert!(timer.sync_with(&session).is_none());
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_does_not_restart_a_running_timer() {
        let session = exam(SessionMode::Exam);
        let mut timer = ExamTimer::new();
        assert!(timer.sync_with(&session).is_some());
        tokio::task::yield_now().await;
        assert!(timer.sync_with(&session).is_none());
        timer.cancel();
        assert!(!timer.is_running());
    }
}
