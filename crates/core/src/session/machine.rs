use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::config::{SessionConfig, SubmitGate};
use crate::model::{AnswerId, AssessmentResult, Question, QuestionId, Quiz, QuizError, QuizId};
use crate::scoring::{self, ScoreEstimate};

use super::review::{QuestionReview, review_question};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no question set has been loaded")]
    NotLoaded,

    #[error("cannot {action} while the session is {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("answers are read-only once the session is completed")]
    ReadOnly,

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error("question index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),

    #[error("answer {answer_id} does not belong to question {question_id}")]
    UnknownAnswer {
        question_id: QuestionId,
        answer_id: AnswerId,
    },

    #[error("at least one answer is required")]
    NoAnswers,

    #[error("all questions must be answered ({answered} of {total} answered)")]
    Incomplete { answered: usize, total: usize },

    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl SessionError {
    /// Local validation failures are rejected before any network call.
    #[must_use]
    pub fn is_local_validation(&self) -> bool {
        matches!(self, SessionError::NoAnswers | SessionError::Incomplete { .. })
    }
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle phase of an assessment attempt.
///
/// `NotStarted → InProgress → Submitting → Completed`, with `Reviewing` as a
/// read-only sub-mode of `Completed`. A failed submit returns to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    NotStarted,
    InProgress,
    Submitting,
    Completed,
    Reviewing,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::NotStarted => "not_started",
            Phase::InProgress => "in_progress",
            Phase::Submitting => "submitting",
            Phase::Completed => "completed",
            Phase::Reviewing => "reviewing",
        }
    }

    /// Completed or reviewing: a Result exists and answers are frozen.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Phase::Completed | Phase::Reviewing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── TICKS & SUBMISSIONS ───────────────────────────────────────────────────────
//

/// What a one-second countdown tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session is not counting down (wrong phase, or time already ran out).
    Idle,
    Running { remaining_secs: u32 },
    /// The countdown just reached zero. Returned exactly once per attempt;
    /// the caller must issue the automatic submit.
    Expired,
}

/// Why a submission was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

/// One `{questionId, answerId}` pair of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub answer_id: AnswerId,
}

/// Dense submission payload built from the sparse selection map.
///
/// Pairs follow question order; unanswered questions are omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub quiz_id: QuizId,
    pub answers: Vec<AnswerSubmission>,
    pub trigger: SubmitTrigger,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State of one assessment attempt.
///
/// Pure and synchronous: time enters only through [`Session::tick`] and the
/// `now` arguments, network calls happen outside and report back through
/// [`Session::complete_submit`] / [`Session::fail_submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    config: SessionConfig,
    quiz_id: Option<QuizId>,
    questions: Vec<Question>,
    current: usize,
    selections: HashMap<QuestionId, AnswerId>,
    remaining_secs: u32,
    expired: bool,
    phase: Phase,
    result: Option<AssessmentResult>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let remaining_secs = config.duration_secs();
        Self {
            config,
            quiz_id: None,
            questions: Vec::new(),
            current: 0,
            selections: HashMap::new(),
            remaining_secs,
            expired: false,
            phase: Phase::NotStarted,
            result: None,
            started_at: None,
            submitted_at: None,
            last_error: None,
        }
    }

    /// Attach a freshly fetched question set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` outside `NotStarted` and
    /// `SessionError::Quiz` when a question violates the configured
    /// correct-answer policy.
    pub fn load(&mut self, quiz: Quiz) -> Result<(), SessionError> {
        self.expect_phase("load questions", Phase::NotStarted)?;
        quiz.check_policy(self.config.correct_answer_policy())?;

        let (quiz_id, questions) = quiz.into_parts();
        self.quiz_id = Some(quiz_id);
        self.questions = questions;
        self.clear_attempt();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotLoaded` without a question set and
    /// `SessionError::InvalidPhase` outside `NotStarted`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.expect_phase("start", Phase::NotStarted)?;
        if self.questions.is_empty() {
            return Err(SessionError::NotLoaded);
        }
        self.phase = Phase::InProgress;
        self.started_at = Some(now);
        self.last_error = None;
        Ok(())
    }

    /// Record (or overwrite) the selection for a question.
    ///
    /// Returns `true` when the stored selection changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ReadOnly` once completed, `InvalidPhase` /
    /// `SubmissionInFlight` outside `InProgress`, and `UnknownQuestion` /
    /// `UnknownAnswer` for ids that are not part of the question set.
    pub fn select_answer(
        &mut self,
        question_id: &QuestionId,
        answer_id: AnswerId,
    ) -> Result<bool, SessionError> {
        match self.phase {
            Phase::InProgress => {}
            Phase::Completed | Phase::Reviewing => return Err(SessionError::ReadOnly),
            Phase::Submitting => return Err(SessionError::SubmissionInFlight),
            phase @ Phase::NotStarted => {
                return Err(SessionError::InvalidPhase {
                    action: "select an answer",
                    phase,
                });
            }
        }

        let question = self
            .questions
            .iter()
            .find(|q| q.id() == question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;
        if question.answer(&answer_id).is_none() {
            return Err(SessionError::UnknownAnswer {
                question_id: question_id.clone(),
                answer_id,
            });
        }

        if self.selections.get(question_id) == Some(&answer_id) {
            return Ok(false);
        }
        self.selections.insert(question_id.clone(), answer_id);
        Ok(true)
    }

    /// [`Session::select_answer`] for the question under the cursor.
    ///
    /// # Errors
    ///
    /// Same as [`Session::select_answer`].
    pub fn select_current(&mut self, answer_id: AnswerId) -> Result<bool, SessionError> {
        let question_id = self
            .current_question()
            .map(|q| q.id().clone())
            .ok_or(SessionError::NotLoaded)?;
        self.select_answer(&question_id, answer_id)
    }

    /// Jump to any question; the current one need not be answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IndexOutOfRange` and leaves the cursor unchanged
    /// for an invalid index, or `InvalidPhase` outside `InProgress`/`Reviewing`.
    pub fn navigate(&mut self, index: usize) -> Result<(), SessionError> {
        self.expect_navigable("navigate")?;
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    /// Move forward one question, staying on the last one at the end.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` outside `InProgress`/`Reviewing`.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.expect_navigable("navigate")?;
        let last = self.questions.len().saturating_sub(1);
        self.current = (self.current + 1).min(last);
        Ok(self.current)
    }

    /// Move back one question, staying on the first one at the start.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` outside `InProgress`/`Reviewing`.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.expect_navigable("navigate")?;
        self.current = self.current.saturating_sub(1);
        Ok(self.current)
    }

    /// Advance the countdown by one second.
    ///
    /// Only counts down while `InProgress`. Reaching zero yields
    /// [`TickOutcome::Expired`] once; any further tick is `Idle`.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != Phase::InProgress || self.expired {
            return TickOutcome::Idle;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.expired = true;
            TickOutcome::Expired
        } else {
            TickOutcome::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    /// Move to `Submitting` and build the payload for the scoring service.
    ///
    /// Manual submits are gated by the configured [`SubmitGate`]; timeout
    /// submits are not, and neither is a manual retry once time has run out.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionInFlight` while already submitting, `InvalidPhase`
    /// outside `InProgress`, and `NoAnswers` / `Incomplete` when the gate
    /// rejects a manual submit. The session is unchanged on error.
    pub fn begin_submit(
        &mut self,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<Submission, SessionError> {
        if self.phase == Phase::Submitting {
            return Err(SessionError::SubmissionInFlight);
        }
        self.expect_phase("submit", Phase::InProgress)?;
        let quiz_id = self.quiz_id.clone().ok_or(SessionError::NotLoaded)?;

        if trigger == SubmitTrigger::Manual && !self.expired {
            self.check_submit_gate()?;
        }

        let answers = self
            .questions
            .iter()
            .filter_map(|q| {
                self.selections.get(q.id()).map(|answer_id| AnswerSubmission {
                    question_id: q.id().clone(),
                    answer_id: answer_id.clone(),
                })
            })
            .collect();

        self.phase = Phase::Submitting;
        self.submitted_at = Some(now);
        self.last_error = None;

        Ok(Submission {
            quiz_id,
            answers,
            trigger,
        })
    }

    /// Attach the scoring service's Result and finish the attempt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` unless `Submitting`.
    pub fn complete_submit(&mut self, result: AssessmentResult) -> Result<(), SessionError> {
        self.expect_phase("complete a submission", Phase::Submitting)?;
        self.result = Some(result);
        self.phase = Phase::Completed;
        Ok(())
    }

    /// Return to `InProgress` after a failed submit.
    ///
    /// Selections, cursor and remaining time are left exactly as they were.
    /// An expired countdown stays expired so only a manual retry can follow.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` unless `Submitting`.
    pub fn fail_submit(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.expect_phase("fail a submission", Phase::Submitting)?;
        self.phase = Phase::InProgress;
        self.submitted_at = None;
        self.last_error = Some(message.into());
        Ok(())
    }

    /// Abandon an in-flight submission whose response will never be applied.
    ///
    /// Same rollback as [`Session::fail_submit`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` unless `Submitting`.
    pub fn cancel_submit(&mut self) -> Result<(), SessionError> {
        self.fail_submit("submission was cancelled before a result arrived")
    }

    /// # Errors
    ///
    /// Returns `InvalidPhase` unless `Completed`.
    pub fn enter_review(&mut self) -> Result<(), SessionError> {
        self.expect_phase("enter review", Phase::Completed)?;
        self.phase = Phase::Reviewing;
        self.current = 0;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidPhase` unless `Reviewing`.
    pub fn exit_review(&mut self) -> Result<(), SessionError> {
        self.expect_phase("leave review", Phase::Reviewing)?;
        self.phase = Phase::Completed;
        Ok(())
    }

    /// Discard the attempt and go back to `NotStarted` with the same question set.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionInFlight` while submitting.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.phase == Phase::Submitting {
            return Err(SessionError::SubmissionInFlight);
        }
        self.phase = Phase::NotStarted;
        self.clear_attempt();
        Ok(())
    }

    /// Drop the question set as well, ready for a fresh [`Session::load`].
    ///
    /// # Errors
    ///
    /// Returns `SubmissionInFlight` while submitting.
    pub fn unload(&mut self) -> Result<(), SessionError> {
        self.reset()?;
        self.quiz_id = None;
        self.questions.clear();
        Ok(())
    }

    /// Surface a message without changing phase (load failures, local validation).
    pub fn note_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Per-question review with correctness revealed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` before the attempt is completed.
    pub fn review(&self) -> Result<Vec<QuestionReview>, SessionError> {
        if !self.phase.is_finished() {
            return Err(SessionError::InvalidPhase {
                action: "review answers",
                phase: self.phase,
            });
        }
        Ok(self
            .questions
            .iter()
            .map(|q| review_question(q, self.selections.get(q.id())))
            .collect())
    }

    /// Advisory local score of the current selections.
    #[must_use]
    pub fn estimate(&self) -> ScoreEstimate {
        scoring::estimate(&self.questions, &self.selections)
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn quiz_id(&self) -> Option<&QuizId> {
        self.quiz_id.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.questions.is_empty()
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current + 1 == self.questions.len()
    }

    #[must_use]
    pub fn selections(&self) -> &HashMap<QuestionId, AnswerId> {
        &self.selections
    }

    #[must_use]
    pub fn selection_for(&self, question_id: &QuestionId) -> Option<&AnswerId> {
        self.selections.get(question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.selections.len()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// The countdown reached zero during this attempt.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Whether an explicit submit would pass the local gate right now.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.phase == Phase::InProgress && (self.expired || self.check_submit_gate().is_ok())
    }

    #[must_use]
    pub fn result(&self) -> Option<&AssessmentResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ─── Internals ─────────────────────────────────────────────────────────────

    fn clear_attempt(&mut self) {
        self.current = 0;
        self.selections.clear();
        self.remaining_secs = self.config.duration_secs();
        self.expired = false;
        self.result = None;
        self.started_at = None;
        self.submitted_at = None;
        self.last_error = None;
    }

    fn check_submit_gate(&self) -> Result<(), SessionError> {
        let answered = self.answered_count();
        if answered == 0 {
            return Err(SessionError::NoAnswers);
        }
        let total = self.questions.len();
        if self.config.submit_gate() == SubmitGate::AllAnswered && answered < total {
            return Err(SessionError::Incomplete { answered, total });
        }
        Ok(())
    }

    fn expect_phase(&self, action: &'static str, expected: Phase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }

    fn expect_navigable(&self, action: &'static str) -> Result<(), SessionError> {
        match self.phase {
            Phase::InProgress | Phase::Reviewing => Ok(()),
            phase => Err(SessionError::InvalidPhase { action, phase }),
        }
    }
}
