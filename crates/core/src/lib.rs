#![forbid(unsafe_code)]

pub mod config;
pub mod model;
pub mod scoring;
pub mod session;
pub mod time;

pub use config::{ConfigError, CorrectAnswerPolicy, SessionConfig, SubmitGate};
pub use session::{
    AnswerSubmission, Phase, QuestionReview, Session, SessionError, Submission, SubmitTrigger,
    TickOutcome,
};
pub use time::Clock;
