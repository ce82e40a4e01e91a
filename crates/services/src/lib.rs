#![forbid(unsafe_code)]

pub mod error;
pub mod history_service;
pub mod sessions;

pub use assessment_core::Clock;

pub use error::AssessmentError;
pub use history_service::{HistoryStats, ResultHistoryService};
pub use sessions::{
    AssessmentController, AssessmentProgress, Countdown, QuestionView, ResultView, TickEvent,
};
