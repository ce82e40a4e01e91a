use assessment_core::model::{AnswerId, Difficulty, DifficultyStats, QuestionId};
use assessment_core::Session;

/// Presentation-agnostic view of the question under the cursor.
///
/// Correctness flags are deliberately absent; they only surface through the
/// review projection once the attempt is completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub question_id: QuestionId,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub weight: u32,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    pub id: AnswerId,
    pub text: String,
    pub is_selected: bool,
}

impl QuestionView {
    #[must_use]
    pub fn current(session: &Session) -> Option<Self> {
        let question = session.current_question()?;
        let selected = session.selection_for(question.id());
        Some(Self {
            index: session.current_index(),
            total: session.total_questions(),
            question_id: question.id().clone(),
            prompt: question.prompt().to_owned(),
            difficulty: question.difficulty(),
            weight: question.weight(),
            options: question
                .answers()
                .iter()
                .map(|a| OptionView {
                    id: a.id.clone(),
                    text: a.text.clone(),
                    is_selected: selected == Some(&a.id),
                })
                .collect(),
        })
    }
}

/// One row of the per-difficulty breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyLine {
    pub difficulty: Difficulty,
    pub stats: DifficultyStats,
}

/// Completed attempt, with the scoring service's numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    /// Authoritative score from the scoring service.
    pub score: f64,
    pub passing_score: u8,
    pub passed: bool,
    pub correct: u32,
    pub total_questions: usize,
    /// Local estimate, for comparison only.
    pub local_estimate: u32,
    /// Only difficulties that had questions.
    pub breakdown: Vec<DifficultyLine>,
}

impl ResultView {
    #[must_use]
    pub fn from_session(session: &Session) -> Option<Self> {
        let result = session.result()?;
        let passing_score = session.config().passing_score();
        let breakdown = Difficulty::ALL
            .iter()
            .map(|d| DifficultyLine {
                difficulty: *d,
                stats: result.breakdown.get(*d).clone(),
            })
            .filter(|line| line.stats.total > 0)
            .collect();

        // Older results may lack a breakdown; fall back to the graded answers.
        let correct = match result.correct_count() {
            0 => u32::try_from(result.answers.iter().filter(|a| a.is_correct).count())
                .unwrap_or(u32::MAX),
            n => n,
        };

        Some(Self {
            score: result.score,
            passing_score,
            passed: result.passed(passing_score),
            correct,
            total_questions: session.total_questions(),
            local_estimate: session.estimate().weighted_percentage,
            breakdown,
        })
    }

    /// Score rounded to a whole percentage for display.
    #[must_use]
    pub fn rounded_score(&self) -> u32 {
        // scores are percentages
        self.score.clamp(0.0, 100.0).round() as u32
    }
}
