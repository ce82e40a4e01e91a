use std::sync::Arc;

use chrono::{DateTime, Utc};

use assessment_core::config::DEFAULT_PASSING_SCORE;
use assessment_core::model::AssessmentResult;
use backend::{ResultHistory, ResultScope};

use crate::error::AssessmentError;

/// Summary statistics over a list of prior results.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStats {
    pub attempts: usize,
    /// Mean score rounded to a whole percentage; 0 without attempts.
    pub average_score: u32,
    pub passed: usize,
    /// Share of passed attempts, as a whole percentage.
    pub pass_rate: u32,
    pub best_score: Option<f64>,
    pub latest_at: Option<DateTime<Utc>>,
}

impl HistoryStats {
    #[must_use]
    pub fn from_results(results: &[AssessmentResult], passing_score: u8) -> Self {
        let attempts = results.len();
        if attempts == 0 {
            return Self {
                attempts,
                average_score: 0,
                passed: 0,
                pass_rate: 0,
                best_score: None,
                latest_at: None,
            };
        }

        let total: f64 = results.iter().map(|r| r.score).sum();
        let passed = results.iter().filter(|r| r.passed(passing_score)).count();
        let best_score = results.iter().map(|r| r.score).reduce(f64::max);
        let latest_at = results.iter().filter_map(|r| r.created_at).max();

        #[allow(clippy::cast_precision_loss)]
        let average = total / attempts as f64;

        Self {
            attempts,
            // scores are percentages
            average_score: average.clamp(0.0, 100.0).round() as u32,
            passed,
            pass_rate: assessment_core::scoring::round_percentage(passed as u64, attempts as u64),
            best_score,
            latest_at,
        }
    }
}

/// Lists prior results and summarizes them against a passing score.
#[derive(Clone)]
pub struct ResultHistoryService {
    history: Arc<dyn ResultHistory>,
    passing_score: u8,
}

impl ResultHistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn ResultHistory>) -> Self {
        Self {
            history,
            passing_score: DEFAULT_PASSING_SCORE,
        }
    }

    #[must_use]
    pub fn with_passing_score(mut self, passing_score: u8) -> Self {
        self.passing_score = passing_score;
        self
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    /// Results in scope, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Backend` if results cannot be loaded.
    pub async fn list(&self, scope: &ResultScope) -> Result<Vec<AssessmentResult>, AssessmentError> {
        Ok(self.history.results(scope).await?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::Backend` if results cannot be loaded.
    pub async fn stats(&self, scope: &ResultScope) -> Result<HistoryStats, AssessmentError> {
        let results = self.list(scope).await?;
        Ok(HistoryStats::from_results(&results, self.passing_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_core::model::{QuizId, ScoreBreakdown};
    use assessment_core::time::fixed_now;
    use chrono::Duration;

    fn result(score: f64, minutes_ago: i64) -> AssessmentResult {
        let mut result = AssessmentResult::new(QuizId::new("quiz"), score, ScoreBreakdown::default());
        result.created_at = Some(fixed_now() - Duration::minutes(minutes_ago));
        result
    }

    #[test]
    fn empty_history_has_zeroed_stats() {
        let stats = HistoryStats::from_results(&[], 70);
        assert_eq!(stats.attempts, 0);
        assert_eq!(stats.average_score, 0);
        assert_eq!(stats.best_score, None);
    }

    #[test]
    fn stats_count_passes_at_the_threshold() {
        let results = [result(70.0, 30), result(45.5, 20), result(90.0, 10)];

        let stats = HistoryStats::from_results(&results, 70);

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.average_score, 69);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.pass_rate, 67);
        assert_eq!(stats.best_score, Some(90.0));
        assert_eq!(stats.latest_at, Some(fixed_now() - Duration::minutes(10)));
    }

    #[test]
    fn lower_passing_score_passes_more() {
        let results = [result(50.0, 1), result(49.0, 2)];
        assert_eq!(HistoryStats::from_results(&results, 50).passed, 1);
    }
}
