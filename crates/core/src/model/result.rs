use chrono::{DateTime, Utc};

use crate::model::ids::{AnswerId, QuestionId, QuizId, ResultId};
use crate::model::question::Difficulty;

/// Per-difficulty slice of a score breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DifficultyStats {
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
    pub weighted_score: f64,
    pub total_weight: u32,
}

/// Score breakdown keyed by difficulty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub easy: DifficultyStats,
    pub medium: DifficultyStats,
    pub hard: DifficultyStats,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn get(&self, difficulty: Difficulty) -> &DifficultyStats {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn get_mut(&mut self, difficulty: Difficulty) -> &mut DifficultyStats {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }

    /// Correct answers summed across all difficulties.
    #[must_use]
    pub fn correct_total(&self) -> u32 {
        Difficulty::ALL.iter().map(|d| self.get(*d).correct).sum()
    }

    #[must_use]
    pub fn question_total(&self) -> u32 {
        Difficulty::ALL.iter().map(|d| self.get(*d).total).sum()
    }
}

/// Backend verdict for one submitted (or skipped) question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: QuestionId,
    pub answer_id: Option<AnswerId>,
    pub is_correct: bool,
}

/// Outcome of scoring one assessment attempt.
///
/// Produced by the scoring service; this is the authoritative score. Local
/// estimates from [`crate::scoring`] never replace it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentResult {
    pub id: Option<ResultId>,
    pub quiz_id: QuizId,
    /// Overall percentage in `[0, 100]`.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub answers: Vec<GradedAnswer>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AssessmentResult {
    #[must_use]
    pub fn new(quiz_id: QuizId, score: f64, breakdown: ScoreBreakdown) -> Self {
        Self {
            id: None,
            quiz_id,
            score,
            breakdown,
            answers: Vec::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn passed(&self, passing_score: u8) -> bool {
        self.score >= f64::from(passing_score)
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.breakdown.correct_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_totals_sum_all_difficulties() {
        let mut breakdown = ScoreBreakdown::default();
        breakdown.get_mut(Difficulty::Easy).correct = 2;
        breakdown.get_mut(Difficulty::Easy).total = 3;
        breakdown.get_mut(Difficulty::Hard).correct = 1;
        breakdown.get_mut(Difficulty::Hard).total = 1;

        assert_eq!(breakdown.correct_total(), 3);
        assert_eq!(breakdown.question_total(), 4);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let result = AssessmentResult::new(QuizId::new("q"), 70.0, ScoreBreakdown::default());
        assert!(result.passed(70));
        assert!(!result.passed(71));
    }
}
