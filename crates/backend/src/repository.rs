use assessment_core::model::{
    AssessmentResult, ContentId, CourseId, LessonId, Quiz, QuizError, QuizId, ResultId,
};
use assessment_core::scoring;
use assessment_core::{Clock, Submission};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::http::HttpBackend;

/// Errors surfaced by backend adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("not authorized")]
    Unauthorized,

    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend returned status {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Status { status: u16, message: Option<String> },

    #[error("backend rejected the request: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid question data: {0}")]
    InvalidData(#[from] QuizError),

    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Transient failures worth retrying as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout | BackendError::Connection(_) => true,
            BackendError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

//
// ─── TARGETS ───────────────────────────────────────────────────────────────────
//

/// Where a question set comes from and where its answers are scored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuizTarget {
    /// A quiz attached to a lesson content item. Without a quiz id the
    /// backend picks one at random.
    Lesson {
        course: CourseId,
        lesson: LessonId,
        content: ContentId,
        quiz: Option<QuizId>,
    },
    /// The final exam of a course.
    CourseExam { course: CourseId },
}

impl QuizTarget {
    #[must_use]
    pub fn lesson(course: CourseId, lesson: LessonId, content: ContentId) -> Self {
        Self::Lesson {
            course,
            lesson,
            content,
            quiz: None,
        }
    }

    #[must_use]
    pub fn course_exam(course: CourseId) -> Self {
        Self::CourseExam { course }
    }

    /// Pin a specific quiz. No effect on course exams.
    #[must_use]
    pub fn with_quiz(mut self, id: QuizId) -> Self {
        if let Self::Lesson { quiz, .. } = &mut self {
            *quiz = Some(id);
        }
        self
    }

    #[must_use]
    pub fn course(&self) -> &CourseId {
        match self {
            Self::Lesson { course, .. } | Self::CourseExam { course } => course,
        }
    }

    /// Same place, any quiz.
    #[must_use]
    pub fn location(&self) -> QuizTarget {
        match self {
            Self::Lesson {
                course,
                lesson,
                content,
                ..
            } => Self::lesson(course.clone(), lesson.clone(), content.clone()),
            Self::CourseExam { course } => Self::course_exam(course.clone()),
        }
    }
}

impl fmt::Display for QuizTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lesson {
                course,
                lesson,
                content,
                quiz,
            } => {
                write!(f, "course {course} / lesson {lesson} / content {content}")?;
                match quiz {
                    Some(quiz) => write!(f, " / quiz {quiz}"),
                    None => f.write_str(" / random quiz"),
                }
            }
            Self::CourseExam { course } => write!(f, "course {course} exam"),
        }
    }
}

/// Which prior results to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResultScope {
    #[default]
    All,
    Course(CourseId),
    Lesson {
        course: CourseId,
        lesson: LessonId,
    },
    Content {
        course: CourseId,
        lesson: LessonId,
        content: ContentId,
    },
}

impl ResultScope {
    /// Whether a result recorded for `target` falls inside this scope.
    #[must_use]
    pub fn covers(&self, target: &QuizTarget) -> bool {
        match (self, target) {
            (Self::All, _) => true,
            (Self::Course(c), t) => t.course() == c,
            (
                Self::Lesson { course, lesson },
                QuizTarget::Lesson {
                    course: tc,
                    lesson: tl,
                    ..
                },
            ) => course == tc && lesson == tl,
            (
                Self::Content {
                    course,
                    lesson,
                    content,
                },
                QuizTarget::Lesson {
                    course: tc,
                    lesson: tl,
                    content: tct,
                    ..
                },
            ) => course == tc && lesson == tl && content == tct,
            _ => false,
        }
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Question bank contract.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the question set for a target.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` when nothing is published there, or
    /// other backend errors.
    async fn fetch_quiz(&self, target: &QuizTarget) -> Result<Quiz, BackendError>;
}

/// Scoring service contract. The returned Result is authoritative.
#[async_trait]
pub trait AnswerScorer: Send + Sync {
    /// Score a submission for the given target.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the submission could not be scored.
    async fn submit(
        &self,
        target: &QuizTarget,
        submission: &Submission,
    ) -> Result<AssessmentResult, BackendError>;
}

/// Prior results contract.
#[async_trait]
pub trait ResultHistory: Send + Sync {
    /// List stored results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if results cannot be loaded.
    async fn results(&self, scope: &ResultScope) -> Result<Vec<AssessmentResult>, BackendError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Disconnected backend: serves seeded quizzes and grades locally.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    quizzes: Arc<Mutex<Vec<(QuizTarget, Quiz)>>>,
    results: Arc<Mutex<Vec<(QuizTarget, AssessmentResult)>>>,
    submissions: Arc<AtomicUsize>,
    failures_pending: Arc<AtomicUsize>,
    clock: Clock,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Publish a quiz at the target's location.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Connection` if the store lock is poisoned.
    pub fn insert_quiz(&self, target: &QuizTarget, quiz: Quiz) -> Result<(), BackendError> {
        let mut guard = self
            .quizzes
            .lock()
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        guard.push((target.location(), quiz));
        Ok(())
    }

    /// Make the next `count` submissions fail with a connection error.
    pub fn fail_next_submissions(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Number of submissions that reached the scorer, failed ones included.
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QuestionSource for InMemoryBackend {
    async fn fetch_quiz(&self, target: &QuizTarget) -> Result<Quiz, BackendError> {
        let guard = self
            .quizzes
            .lock()
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let location = target.location();
        let candidates: Vec<&Quiz> = guard
            .iter()
            .filter(|(stored, _)| *stored == location)
            .map(|(_, quiz)| quiz)
            .collect();

        let picked = match target {
            QuizTarget::Lesson {
                quiz: Some(quiz_id),
                ..
            } => candidates.into_iter().find(|q| q.id() == quiz_id),
            _ => candidates.choose(&mut rand::rng()).copied(),
        };
        picked.cloned().ok_or(BackendError::NotFound)
    }
}

#[async_trait]
impl AnswerScorer for InMemoryBackend {
    async fn submit(
        &self,
        target: &QuizTarget,
        submission: &Submission,
    ) -> Result<AssessmentResult, BackendError> {
        let attempt = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.take_failure() {
            return Err(BackendError::Connection("scoring service unavailable".into()));
        }

        let quiz = {
            let guard = self
                .quizzes
                .lock()
                .map_err(|e| BackendError::Connection(e.to_string()))?;
            let location = target.location();
            guard
                .iter()
                .find(|(stored, quiz)| *stored == location && quiz.id() == &submission.quiz_id)
                .map(|(_, quiz)| quiz.clone())
                .ok_or(BackendError::NotFound)?
        };

        let selections: HashMap<_, _> = submission
            .answers
            .iter()
            .map(|a| (a.question_id.clone(), a.answer_id.clone()))
            .collect();
        let mut result = scoring::grade_locally(quiz.id(), quiz.questions(), &selections);
        result.id = Some(ResultId::new(format!("local-{attempt}")));
        result.created_at = Some(self.clock.now());

        let mut guard = self
            .results
            .lock()
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        guard.push((target.location(), result.clone()));
        Ok(result)
    }
}

#[async_trait]
impl ResultHistory for InMemoryBackend {
    async fn results(&self, scope: &ResultScope) -> Result<Vec<AssessmentResult>, BackendError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .rev()
            .filter(|(target, _)| scope.covers(target))
            .map(|(_, result)| result.clone())
            .collect())
    }
}

/// Bundles the three collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Backend {
    pub questions: Arc<dyn QuestionSource>,
    pub scorer: Arc<dyn AnswerScorer>,
    pub history: Arc<dyn ResultHistory>,
}

impl Backend {
    #[must_use]
    pub fn in_memory(backend: InMemoryBackend) -> Self {
        let questions: Arc<dyn QuestionSource> = Arc::new(backend.clone());
        let scorer: Arc<dyn AnswerScorer> = Arc::new(backend.clone());
        let history: Arc<dyn ResultHistory> = Arc::new(backend);
        Self {
            questions,
            scorer,
            history,
        }
    }

    #[must_use]
    pub fn http(backend: HttpBackend) -> Self {
        let backend = Arc::new(backend);
        Self {
            questions: backend.clone(),
            scorer: backend.clone(),
            history: backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_core::model::{Answer, AnswerId, Difficulty, Question, QuestionId};
    use assessment_core::session::{AnswerSubmission, SubmitTrigger};
    use assessment_core::time::{fixed_clock, fixed_now};

    fn target() -> QuizTarget {
        QuizTarget::lesson(CourseId::new("c1"), LessonId::new("l1"), ContentId::new("ct1"))
    }

    fn build_quiz(id: &str) -> Quiz {
        let questions = (1..=2)
            .map(|n| {
                Question::new(
                    format!("{id}-q{n}").as_str(),
                    format!("Question {n}"),
                    Difficulty::Medium,
                    n,
                    vec![
                        Answer::new(format!("{id}-q{n}-a").as_str(), "right", true),
                        Answer::new(format!("{id}-q{n}-b").as_str(), "wrong", false),
                    ],
                )
                .unwrap()
            })
            .collect();
        Quiz::new(id, questions).unwrap()
    }

    fn submission(quiz: &str, picks: &[(&str, &str)]) -> Submission {
        Submission {
            quiz_id: QuizId::new(quiz),
            answers: picks
                .iter()
                .map(|(q, a)| AnswerSubmission {
                    question_id: QuestionId::new(*q),
                    answer_id: AnswerId::new(*a),
                })
                .collect(),
            trigger: SubmitTrigger::Manual,
        }
    }

    #[tokio::test]
    async fn explicit_quiz_is_found_and_random_pick_stays_in_location() {
        let backend = InMemoryBackend::new();
        backend.insert_quiz(&target(), build_quiz("quiz-a")).unwrap();
        backend.insert_quiz(&target(), build_quiz("quiz-b")).unwrap();

        let pinned = backend
            .fetch_quiz(&target().with_quiz(QuizId::new("quiz-b")))
            .await
            .unwrap();
        assert_eq!(pinned.id().as_str(), "quiz-b");

        let random = backend.fetch_quiz(&target()).await.unwrap();
        assert!(["quiz-a", "quiz-b"].contains(&random.id().as_str()));

        let elsewhere = QuizTarget::course_exam(CourseId::new("c2"));
        assert!(matches!(
            backend.fetch_quiz(&elsewhere).await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn submit_grades_locally_and_records_history() {
        let backend = InMemoryBackend::new().with_clock(fixed_clock());
        backend.insert_quiz(&target(), build_quiz("quiz-a")).unwrap();

        let result = backend
            .submit(&target(), &submission("quiz-a", &[("quiz-a-q2", "quiz-a-q2-a")]))
            .await
            .unwrap();

        // weights 1 and 2, only the heavier one right
        assert_eq!(result.score, 67.0);
        assert_eq!(result.created_at, Some(fixed_now()));
        assert_eq!(result.id, Some(ResultId::new("local-1")));

        let all = backend.results(&ResultScope::All).await.unwrap();
        assert_eq!(all.len(), 1);
        let other_course = backend
            .results(&ResultScope::Course(CourseId::new("c9")))
            .await
            .unwrap();
        assert!(other_course.is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_counted_then_cleared() {
        let backend = InMemoryBackend::new();
        backend.insert_quiz(&target(), build_quiz("quiz-a")).unwrap();
        backend.fail_next_submissions(1);

        let err = backend
            .submit(&target(), &submission("quiz-a", &[]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        backend.submit(&target(), &submission("quiz-a", &[])).await.unwrap();
        assert_eq!(backend.submission_count(), 2);
    }

    #[test]
    fn scopes_narrow_by_location() {
        let lesson = ResultScope::Lesson {
            course: CourseId::new("c1"),
            lesson: LessonId::new("l1"),
        };
        assert!(lesson.covers(&target()));
        assert!(!lesson.covers(&QuizTarget::course_exam(CourseId::new("c1"))));
        assert!(ResultScope::Course(CourseId::new("c1")).covers(&QuizTarget::course_exam(CourseId::new("c1"))));
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(BackendError::Status { status: 503, message: None }.is_retryable());
        assert!(!BackendError::Status { status: 400, message: None }.is_retryable());
        assert!(!BackendError::Unauthorized.is_retryable());
    }
}
