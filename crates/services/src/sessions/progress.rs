use assessment_core::scoring::round_percentage;
use assessment_core::{Phase, Session};

/// Answered/unanswered marker for one slot of the question grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionStatus {
    pub index: usize,
    pub answered: bool,
    pub is_current: bool,
}

/// Aggregated view of assessment progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentProgress {
    pub phase: Phase,
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub current_index: usize,
    /// `(current_index + 1) / total`, as a whole percentage.
    pub position_percent: u32,
    pub is_last_question: bool,
    pub can_submit: bool,
    pub remaining_secs: u32,
    pub is_expired: bool,
    pub grid: Vec<QuestionStatus>,
}

impl AssessmentProgress {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let total = session.total_questions();
        let answered = session.answered_count();
        let current_index = session.current_index();
        let grid = session
            .questions()
            .iter()
            .enumerate()
            .map(|(index, q)| QuestionStatus {
                index,
                answered: session.selection_for(q.id()).is_some(),
                is_current: index == current_index,
            })
            .collect();

        Self {
            phase: session.phase(),
            total,
            answered,
            unanswered: total.saturating_sub(answered),
            current_index,
            position_percent: if total == 0 {
                0
            } else {
                round_percentage(current_index as u64 + 1, total as u64)
            },
            is_last_question: session.is_last_question(),
            can_submit: session.can_submit(),
            remaining_secs: session.remaining_secs(),
            is_expired: session.is_expired(),
            grid,
        }
    }
}
