//! Local score estimation.
//!
//! Everything here is advisory. The scoring service's [`AssessmentResult`] is
//! the only score that may be persisted or shown as final; the backend can
//! apply partial credit or different weighting, so local and authoritative
//! numbers are allowed to diverge. Use these estimates for instant feedback
//! and for the offline/demo scorer.

use std::collections::HashMap;

use crate::model::{AnswerId, AssessmentResult, GradedAnswer, Question, QuestionId, QuizId, ScoreBreakdown};

/// Locally computed score for a set of selections.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEstimate {
    pub correct: u32,
    pub total: u32,
    /// `round(100 × correct / total)`
    pub percentage: u32,
    /// `round(100 × Σweight(correct) / Σweight(all))`
    pub weighted_percentage: u32,
    pub breakdown: ScoreBreakdown,
}

/// `round(100 × numerator / denominator)` with halves rounded up; 0 for an empty denominator.
#[must_use]
pub fn round_percentage(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let rounded = (200 * numerator + denominator) / (2 * denominator);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

fn percentage_2dp(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let raw = f64::from(numerator) / f64::from(denominator) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Estimate the score for `selections` over `questions`.
///
/// Unanswered questions count as incorrect. A selection only counts when it
/// exactly matches the question's first correct answer.
#[must_use]
pub fn estimate(questions: &[Question], selections: &HashMap<QuestionId, AnswerId>) -> ScoreEstimate {
    let mut breakdown = ScoreBreakdown::default();
    let mut correct = 0_u32;
    let mut earned_weight = 0_u64;
    let mut total_weight = 0_u64;

    for question in questions {
        let weight = question.weight();
        let is_correct = selections
            .get(question.id())
            .is_some_and(|selected| question.is_correct_selection(selected));

        let stats = breakdown.get_mut(question.difficulty());
        stats.total = stats.total.saturating_add(1);
        stats.total_weight = stats.total_weight.saturating_add(weight);
        total_weight += u64::from(weight);

        if is_correct {
            correct = correct.saturating_add(1);
            stats.correct = stats.correct.saturating_add(1);
            stats.weighted_score += f64::from(weight);
            earned_weight += u64::from(weight);
        }
    }

    for stats in [&mut breakdown.easy, &mut breakdown.medium, &mut breakdown.hard] {
        stats.percentage = percentage_2dp(stats.correct, stats.total);
    }

    let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);
    ScoreEstimate {
        correct,
        total,
        percentage: round_percentage(u64::from(correct), u64::from(total)),
        weighted_percentage: round_percentage(earned_weight, total_weight),
        breakdown,
    }
}

/// Grade a submission entirely on the client, in the shape the scoring service returns.
///
/// Only meant for disconnected/demo scorers; the overall score is the weighted
/// percentage.
#[must_use]
pub fn grade_locally(
    quiz_id: &QuizId,
    questions: &[Question],
    selections: &HashMap<QuestionId, AnswerId>,
) -> AssessmentResult {
    let estimate = estimate(questions, selections);
    let mut result = AssessmentResult::new(
        quiz_id.clone(),
        f64::from(estimate.weighted_percentage),
        estimate.breakdown,
    );
    result.answers = questions
        .iter()
        .map(|question| {
            let answer_id = selections.get(question.id()).cloned();
            let is_correct = answer_id
                .as_ref()
                .is_some_and(|selected| question.is_correct_selection(selected));
            GradedAnswer {
                question_id: question.id().clone(),
                answer_id,
                is_correct,
            }
        })
        .collect();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, Difficulty};

    fn question(id: &str, difficulty: Difficulty, weight: u32) -> Question {
        Question::new(
            id,
            format!("Prompt {id}"),
            difficulty,
            weight,
            vec![
                Answer::new(format!("{id}-right").as_str(), "right", true),
                Answer::new(format!("{id}-wrong").as_str(), "wrong", false),
            ],
        )
        .unwrap()
    }

    fn select(map: &mut HashMap<QuestionId, AnswerId>, q: &str, suffix: &str) {
        map.insert(QuestionId::new(q), AnswerId::new(format!("{q}-{suffix}")));
    }

    #[test]
    fn weighted_happy_path_is_seventy_five_percent() {
        let questions = vec![
            question("q1", Difficulty::Easy, 1),
            question("q2", Difficulty::Medium, 1),
            question("q3", Difficulty::Hard, 2),
        ];
        let mut selections = HashMap::new();
        select(&mut selections, "q1", "right");
        select(&mut selections, "q2", "wrong");
        select(&mut selections, "q3", "right");

        let estimate = estimate(&questions, &selections);

        assert_eq!(estimate.correct, 2);
        assert_eq!(estimate.total, 3);
        assert_eq!(estimate.percentage, 67);
        assert_eq!(estimate.weighted_percentage, 75);
        assert_eq!(estimate.breakdown.hard.weighted_score, 2.0);
        assert_eq!(estimate.breakdown.medium.percentage, 0.0);
        assert_eq!(estimate.breakdown.easy.percentage, 100.0);
    }

    #[test]
    fn unanswered_questions_count_as_wrong() {
        let questions = vec![question("q1", Difficulty::Easy, 1), question("q2", Difficulty::Easy, 1)];
        let mut selections = HashMap::new();
        select(&mut selections, "q1", "right");

        let estimate = estimate(&questions, &selections);
        assert_eq!(estimate.percentage, 50);
        assert_eq!(estimate.breakdown.easy.total, 2);
        assert_eq!(estimate.breakdown.easy.total_weight, 2);
    }

    #[test]
    fn rounding_goes_half_up() {
        assert_eq!(round_percentage(1, 8), 13);
        assert_eq!(round_percentage(1, 3), 33);
        assert_eq!(round_percentage(2, 3), 67);
        assert_eq!(round_percentage(0, 0), 0);
    }

    #[test]
    fn local_grading_lists_every_question() {
        let questions = vec![question("q1", Difficulty::Easy, 1), question("q2", Difficulty::Hard, 3)];
        let mut selections = HashMap::new();
        select(&mut selections, "q2", "right");

        let result = grade_locally(&QuizId::new("quiz"), &questions, &selections);

        assert_eq!(result.score, 75.0);
        assert_eq!(result.answers.len(), 2);
        assert_eq!(result.answers[0].answer_id, None);
        assert!(!result.answers[0].is_correct);
        assert!(result.answers[1].is_correct);
        assert_eq!(result.correct_count(), 1);
    }
}
