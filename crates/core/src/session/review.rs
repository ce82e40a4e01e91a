use crate::model::{AnswerId, Difficulty, Question, QuestionId};

/// Study hint shown for a missed question that carries no explanation.
pub const FALLBACK_STUDY_HINT: &str =
    "Review the course material to understand this concept better.";

/// One answer option as shown in review mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOption {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
    pub is_selected: bool,
}

/// A question after completion, with correctness revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub weight: u32,
    pub options: Vec<ReviewOption>,
    pub selected: Option<AnswerId>,
    pub is_correct: bool,
    /// One-line verdict naming the correct answer.
    pub verdict: String,
    /// The question's explanation; falls back to the verdict for correct
    /// answers and to a study hint for missed ones.
    pub explanation: String,
}

impl QuestionReview {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }
}

/// Build the review projection of `question` given the learner's selection.
#[must_use]
pub fn review_question(question: &Question, selected: Option<&AnswerId>) -> QuestionReview {
    let is_correct = selected.is_some_and(|id| question.is_correct_selection(id));
    let correct_text = question.correct_answer().map(|a| a.text.as_str());

    let verdict = match (is_correct, correct_text) {
        (true, Some(text)) => format!("You correctly identified \"{text}\" as the right answer."),
        (false, Some(text)) => format!("The correct answer is \"{text}\"."),
        (_, None) => "No correct answer was provided for this question.".to_owned(),
    };

    let explanation = match question.explanation() {
        Some(text) => text.to_owned(),
        None if is_correct => verdict.clone(),
        None => FALLBACK_STUDY_HINT.to_owned(),
    };

    let correct_id = question.correct_answer().map(|a| &a.id);
    let options = question
        .answers()
        .iter()
        .map(|answer| ReviewOption {
            id: answer.id.clone(),
            text: answer.text.clone(),
            is_correct: Some(&answer.id) == correct_id,
            is_selected: selected == Some(&answer.id),
        })
        .collect();

    QuestionReview {
        question_id: question.id().clone(),
        prompt: question.prompt().to_owned(),
        difficulty: question.difficulty(),
        weight: question.weight(),
        options,
        selected: selected.cloned(),
        is_correct,
        verdict,
        explanation,
    }
}
