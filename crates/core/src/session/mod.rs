//! Assessment session state machine and answer review.

mod machine;
mod review;

pub use machine::{
    AnswerSubmission, Phase, Session, SessionError, Submission, SubmitTrigger, TickOutcome,
};
pub use review::{
    FALLBACK_STUDY_HINT, QuestionReview, ReviewOption, review_question,
};

#[cfg(test)]
mod tests;
