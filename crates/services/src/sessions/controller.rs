use std::sync::Arc;

use assessment_core::model::{AnswerId, AssessmentResult, QuestionId};
use assessment_core::session::QuestionReview;
use assessment_core::{
    Clock, Phase, Session, SessionConfig, SessionError, SubmitTrigger, TickOutcome,
};
use backend::{AnswerScorer, Backend, QuestionSource, QuizTarget};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::progress::AssessmentProgress;
use super::timer::{Countdown, TICK_PERIOD};
use super::view::{QuestionView, ResultView};
use crate::error::AssessmentError;

/// What handling one countdown tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    /// Nothing to do (not in progress, or the tick arrived after a pause).
    Idle,
    Ticked { remaining_secs: u32 },
    /// Time ran out and the automatic submit was scored.
    AutoSubmitted(AssessmentResult),
    /// Time ran out and the automatic submit failed; manual retry is possible.
    AutoSubmitFailed(String),
}

/// Drives one assessment attempt against the question bank and scoring service.
///
/// Single owner of the [`Session`]. The countdown is a background task that
/// only produces ticks; ticks are applied when the caller awaits
/// [`AssessmentController::next_tick`], so every state change happens
/// through `&mut self`.
pub struct AssessmentController {
    session: Session,
    target: QuizTarget,
    questions: Arc<dyn QuestionSource>,
    scorer: Arc<dyn AnswerScorer>,
    clock: Clock,
    countdown: Option<Countdown>,
    tick_tx: UnboundedSender<()>,
    tick_rx: UnboundedReceiver<()>,
}

impl AssessmentController {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        target: QuizTarget,
        questions: Arc<dyn QuestionSource>,
        scorer: Arc<dyn AnswerScorer>,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(config),
            target,
            questions,
            scorer,
            clock: Clock::system(),
            countdown: None,
            tick_tx,
            tick_rx,
        }
    }

    #[must_use]
    pub fn from_backend(config: SessionConfig, target: QuizTarget, backend: &Backend) -> Self {
        Self::new(
            config,
            target,
            Arc::clone(&backend.questions),
            Arc::clone(&backend.scorer),
        )
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────────

    /// Fetch the question set for the target.
    ///
    /// On failure the session stays `NotStarted` with the error noted, and
    /// calling `load` again retries.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Backend` if the fetch fails and
    /// `AssessmentError::Session` if the questions are unusable or the
    /// session is past `NotStarted`.
    pub async fn load(&mut self) -> Result<(), AssessmentError> {
        if self.session.phase() != Phase::NotStarted {
            return Err(SessionError::InvalidPhase {
                action: "load questions",
                phase: self.session.phase(),
            }
            .into());
        }
        info!(quiz_target = %self.target, "loading questions");

        let quiz = match self.questions.fetch_quiz(&self.target).await {
            Ok(quiz) => quiz,
            Err(e) => {
                warn!(quiz_target = %self.target, error = %e, "question fetch failed");
                self.session.note_error(e.to_string());
                return Err(e.into());
            }
        };

        self.session.unload()?;
        if let Err(e) = self.session.load(quiz) {
            warn!(error = %e, "question set rejected");
            self.session.note_error(e.to_string());
            return Err(e.into());
        }
        info!(
            quiz = %self.session.quiz_id().map(ToString::to_string).unwrap_or_default(),
            questions = self.session.total_questions(),
            "questions loaded"
        );
        Ok(())
    }

    /// Start answering, loading the question set first if needed.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if loading fails or the session cannot start.
    pub async fn start(&mut self) -> Result<(), AssessmentError> {
        if !self.session.is_loaded() {
            self.load().await?;
        }
        self.session.start(self.clock.now())?;
        self.resume_countdown();
        info!(
            duration_secs = self.session.remaining_secs(),
            "assessment started"
        );
        Ok(())
    }

    /// Throw away the attempt and go back to `NotStarted`.
    ///
    /// With `refetch`, a fresh question set is loaded (a new random quiz for
    /// random targets); otherwise the same questions are reused.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Session` while a submission is in flight, or
    /// the load error when refetching fails.
    pub async fn restart(&mut self, refetch: bool) -> Result<(), AssessmentError> {
        self.session.reset()?;
        self.pause_countdown();
        info!(refetch, "assessment restarted");
        if refetch {
            self.load().await?;
        }
        Ok(())
    }

    // ─── Answering ─────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` if the selection is not allowed.
    pub fn select_answer(
        &mut self,
        question_id: &QuestionId,
        answer_id: AnswerId,
    ) -> Result<bool, AssessmentError> {
        Ok(self.session.select_answer(question_id, answer_id)?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` if the selection is not allowed.
    pub fn select_current(&mut self, answer_id: AnswerId) -> Result<bool, AssessmentError> {
        Ok(self.session.select_current(answer_id)?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` for an out-of-range index.
    pub fn navigate(&mut self, index: usize) -> Result<(), AssessmentError> {
        Ok(self.session.navigate(index)?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` outside answering or review.
    pub fn next(&mut self) -> Result<usize, AssessmentError> {
        Ok(self.session.next()?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` outside answering or review.
    pub fn previous(&mut self) -> Result<usize, AssessmentError> {
        Ok(self.session.previous()?)
    }

    // ─── Submitting ────────────────────────────────────────────────────────────

    /// Submit the current selections for scoring.
    ///
    /// The countdown is paused while the request is in flight. On failure the
    /// session returns to answering with everything preserved, and the
    /// countdown resumes if time remains. Dropping the returned future before
    /// it resolves cancels the submission the same way.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Session` for local validation failures (no
    /// network call is made) and `AssessmentError::Backend` when scoring fails.
    pub async fn submit(&mut self) -> Result<AssessmentResult, AssessmentError> {
        self.submit_with(SubmitTrigger::Manual).await
    }

    async fn submit_with(&mut self, trigger: SubmitTrigger) -> Result<AssessmentResult, AssessmentError> {
        let submission = match self.session.begin_submit(trigger, self.clock.now()) {
            Ok(submission) => submission,
            Err(e) => {
                if e.is_local_validation() {
                    debug!(error = %e, "submit rejected locally");
                    self.session.note_error(e.to_string());
                }
                return Err(e.into());
            }
        };
        self.pause_countdown();
        info!(
            quiz = %submission.quiz_id,
            answers = submission.answers.len(),
            ?trigger,
            "submitting answers"
        );

        let scorer = Arc::clone(&self.scorer);
        let target = self.target.clone();
        let mut pending = PendingSubmit {
            controller: self,
            armed: true,
        };
        let outcome = scorer.submit(&target, &submission).await;
        pending.armed = false;
        let this = &mut *pending.controller;

        match outcome {
            Ok(result) => {
                this.session.complete_submit(result.clone())?;
                info!(
                    score = result.score,
                    passed = result.passed(this.session.config().passing_score()),
                    "assessment completed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), ?trigger, "submission failed");
                this.session.fail_submit(e.to_string())?;
                if !this.session.is_expired() {
                    this.resume_countdown();
                }
                Err(e.into())
            }
        }
    }

    fn abandon_submit(&mut self) {
        if self.session.cancel_submit().is_err() {
            return;
        }
        warn!("submission cancelled before a result arrived");
        // the countdown task needs a runtime to spawn on
        if !self.session.is_expired() && tokio::runtime::Handle::try_current().is_ok() {
            self.resume_countdown();
        }
    }

    // ─── Countdown ─────────────────────────────────────────────────────────────

    /// Resolve once the countdown has produced a tick.
    ///
    /// Cancel-safe and pending while the countdown is stopped, so it can be
    /// raced against user input in a `select!`; follow up with
    /// [`AssessmentController::handle_tick`] outside the `select!`.
    pub async fn tick_ready(&mut self) {
        // the controller holds a sender, so the channel never closes
        let _ = self.tick_rx.recv().await;
    }

    /// Wait for the next countdown tick and apply it.
    pub async fn next_tick(&mut self) -> TickEvent {
        self.tick_ready().await;
        self.handle_tick().await
    }

    /// Apply one countdown tick; expiry issues the automatic submit.
    pub async fn handle_tick(&mut self) -> TickEvent {
        match self.session.tick() {
            TickOutcome::Idle => TickEvent::Idle,
            TickOutcome::Running { remaining_secs } => TickEvent::Ticked { remaining_secs },
            TickOutcome::Expired => {
                self.pause_countdown();
                warn!("time is up, submitting automatically");
                match self.submit_with(SubmitTrigger::Timeout).await {
                    Ok(result) => TickEvent::AutoSubmitted(result),
                    Err(e) => TickEvent::AutoSubmitFailed(e.to_string()),
                }
            }
        }
    }

    #[must_use]
    pub fn is_counting_down(&self) -> bool {
        self.countdown.as_ref().is_some_and(Countdown::is_running)
    }

    fn resume_countdown(&mut self) {
        if self.countdown.is_none() {
            self.countdown = Some(Countdown::start(TICK_PERIOD, self.tick_tx.clone()));
        }
    }

    fn pause_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.stop();
        }
        // ticks emitted before the pause belong to the old run
        while self.tick_rx.try_recv().is_ok() {}
    }

    // ─── Review ────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` unless the attempt is completed.
    pub fn enter_review(&mut self) -> Result<Vec<QuestionReview>, AssessmentError> {
        self.session.enter_review()?;
        Ok(self.session.review()?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` unless reviewing.
    pub fn exit_review(&mut self) -> Result<(), AssessmentError> {
        Ok(self.session.exit_review()?)
    }

    // ─── Snapshots ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn target(&self) -> &QuizTarget {
        &self.target
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    #[must_use]
    pub fn progress(&self) -> AssessmentProgress {
        AssessmentProgress::from_session(&self.session)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<QuestionView> {
        QuestionView::current(&self.session)
    }

    #[must_use]
    pub fn result_view(&self) -> Option<ResultView> {
        ResultView::from_session(&self.session)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Session` before completion.
    pub fn review(&self) -> Result<Vec<QuestionReview>, AssessmentError> {
        Ok(self.session.review()?)
    }
}

/// Rolls an in-flight submission back if its future is dropped before the
/// scorer answers.
struct PendingSubmit<'a> {
    controller: &'a mut AssessmentController,
    armed: bool,
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon_submit();
        }
    }
}
