use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::CorrectAnswerPolicy;
use crate::model::ids::{AnswerId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {question_id} has no answers")]
    NoAnswers { question_id: QuestionId },

    #[error("question {question_id} must have a positive weight")]
    InvalidWeight { question_id: QuestionId },

    #[error("question {question_id} lists answer {answer_id} more than once")]
    DuplicateAnswer {
        question_id: QuestionId,
        answer_id: AnswerId,
    },

    #[error("question {question_id} has no answer flagged correct")]
    NoCorrectAnswer { question_id: QuestionId },

    #[error("question {question_id} has {count} answers flagged correct")]
    AmbiguousCorrectAnswer { question_id: QuestionId, count: usize },

    #[error("unknown difficulty: {0}")]
    InvalidDifficulty(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz {quiz_id} has no questions")]
    Empty { quiz_id: QuizId },

    #[error("quiz lists question {0} more than once")]
    DuplicateQuestion(QuestionId),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty tier of a question, as tagged by the question bank.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(QuestionError::InvalidDifficulty(other.to_owned())),
        }
    }
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// One selectable answer of a multiple-choice question.
///
/// The correctness flag travels with the payload but must stay hidden from the
/// learner until the session is completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

impl Answer {
    #[must_use]
    pub fn new(id: impl Into<AnswerId>, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            is_correct,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question as delivered by the question bank.
///
/// Immutable once fetched for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    difficulty: Difficulty,
    weight: u32,
    answers: Vec<Answer>,
    explanation: Option<String>,
}

impl Question {
    /// Build a question, checking the structural rules every question must satisfy.
    ///
    /// Correct-answer cardinality is *not* checked here; it depends on the
    /// session's `CorrectAnswerPolicy` (see [`Question::check_policy`]).
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidWeight` for a zero weight,
    /// `QuestionError::NoAnswers` for an empty answer list and
    /// `QuestionError::DuplicateAnswer` when an answer id repeats.
    pub fn new(
        id: impl Into<QuestionId>,
        prompt: impl Into<String>,
        difficulty: Difficulty,
        weight: u32,
        answers: Vec<Answer>,
    ) -> Result<Self, QuestionError> {
        let id = id.into();
        if weight == 0 {
            return Err(QuestionError::InvalidWeight { question_id: id });
        }
        if answers.is_empty() {
            return Err(QuestionError::NoAnswers { question_id: id });
        }
        let mut seen = HashSet::with_capacity(answers.len());
        for answer in &answers {
            if !seen.insert(&answer.id) {
                return Err(QuestionError::DuplicateAnswer {
                    question_id: id,
                    answer_id: answer.id.clone(),
                });
            }
        }

        Ok(Self {
            id,
            prompt: prompt.into(),
            difficulty,
            weight,
            answers,
            explanation: None,
        })
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: Option<String>) -> Self {
        self.explanation = explanation.filter(|text| !text.trim().is_empty());
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn weight(&self) -> u32 {
        self.weight
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn answer(&self, id: &AnswerId) -> Option<&Answer> {
        self.answers.iter().find(|a| &a.id == id)
    }

    /// The first answer flagged correct.
    #[must_use]
    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.is_correct)
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    /// Whether `selected` is an exact match for [`Question::correct_answer`].
    #[must_use]
    pub fn is_correct_selection(&self, selected: &AnswerId) -> bool {
        self.correct_answer().is_some_and(|a| &a.id == selected)
    }

    /// Check correct-answer cardinality against the given policy.
    ///
    /// # Errors
    ///
    /// Under `Strict`, returns `NoCorrectAnswer` or `AmbiguousCorrectAnswer`
    /// unless exactly one answer is flagged. Under `FirstFlagged`, only a
    /// question with no correct answer at all is rejected.
    pub fn check_policy(&self, policy: CorrectAnswerPolicy) -> Result<(), QuestionError> {
        let count = self.correct_count();
        match (policy, count) {
            (_, 0) => Err(QuestionError::NoCorrectAnswer {
                question_id: self.id.clone(),
            }),
            (CorrectAnswerPolicy::Strict, 1) | (CorrectAnswerPolicy::FirstFlagged, _) => Ok(()),
            (CorrectAnswerPolicy::Strict, count) => Err(QuestionError::AmbiguousCorrectAnswer {
                question_id: self.id.clone(),
                count,
            }),
        }
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// An ordered question set for one quiz or exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    questions: Vec<Question>,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `QuizError::Empty` when there are no questions and
    /// `QuizError::DuplicateQuestion` when a question id repeats.
    pub fn new(id: impl Into<QuizId>, questions: Vec<Question>) -> Result<Self, QuizError> {
        let id = id.into();
        if questions.is_empty() {
            return Err(QuizError::Empty { quiz_id: id });
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id().clone()));
            }
        }
        Ok(Self { id, questions })
    }

    #[must_use]
    pub fn id(&self) -> &QuizId {
        &self.id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Check every question against the correct-answer policy.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` encountered.
    pub fn check_policy(&self, policy: CorrectAnswerPolicy) -> Result<(), QuizError> {
        for question in &self.questions {
            question.check_policy(policy)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn into_parts(self) -> (QuizId, Vec<Question>) {
        (self.id, self.questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(flags: &[bool]) -> Vec<Answer> {
        flags
            .iter()
            .enumerate()
            .map(|(i, correct)| Answer::new(format!("a{i}").as_str(), format!("Option {i}"), *correct))
            .collect()
    }

    #[test]
    fn zero_weight_is_rejected() {
        let err = Question::new("q1", "Prompt", Difficulty::Easy, 0, answers(&[true])).unwrap_err();
        assert!(matches!(err, QuestionError::InvalidWeight { .. }));
    }

    #[test]
    fn duplicate_answer_ids_are_rejected() {
        let dup = vec![Answer::new("a", "x", true), Answer::new("a", "y", false)];
        let err = Question::new("q1", "Prompt", Difficulty::Easy, 1, dup).unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateAnswer { .. }));
    }

    #[test]
    fn strict_policy_requires_exactly_one_correct_answer() {
        let none = Question::new("q1", "P", Difficulty::Easy, 1, answers(&[false, false])).unwrap();
        let many = Question::new("q2", "P", Difficulty::Easy, 1, answers(&[true, true])).unwrap();
        let one = Question::new("q3", "P", Difficulty::Easy, 1, answers(&[false, true])).unwrap();

        assert!(matches!(
            none.check_policy(CorrectAnswerPolicy::Strict),
            Err(QuestionError::NoCorrectAnswer { .. })
        ));
        assert!(matches!(
            many.check_policy(CorrectAnswerPolicy::Strict),
            Err(QuestionError::AmbiguousCorrectAnswer { count: 2, .. })
        ));
        assert!(one.check_policy(CorrectAnswerPolicy::Strict).is_ok());
    }

    #[test]
    fn first_flagged_policy_scores_against_first_correct_answer() {
        let q = Question::new("q1", "P", Difficulty::Hard, 2, answers(&[false, true, true])).unwrap();
        assert!(q.check_policy(CorrectAnswerPolicy::FirstFlagged).is_ok());
        assert!(q.is_correct_selection(&AnswerId::new("a1")));
        assert!(!q.is_correct_selection(&AnswerId::new("a2")));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn blank_explanation_is_dropped() {
        let q = Question::new("q1", "P", Difficulty::Easy, 1, answers(&[true]))
            .unwrap()
            .with_explanation(Some("  ".into()));
        assert_eq!(q.explanation(), None);
    }

    #[test]
    fn quiz_rejects_duplicate_questions() {
        let q = Question::new("q1", "P", Difficulty::Easy, 1, answers(&[true])).unwrap();
        let err = Quiz::new("quiz", vec![q.clone(), q]).unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new("q1")));
    }

    #[test]
    fn quiz_rejects_empty_question_set() {
        let err = Quiz::new("quiz", Vec::new()).unwrap_err();
        assert!(matches!(err, QuizError::Empty { .. }));
    }
}
