#![forbid(unsafe_code)]

pub mod http;
pub mod repository;

pub use http::{ApiConfig, HttpBackend};
pub use repository::{
    AnswerScorer, Backend, BackendError, InMemoryBackend, QuestionSource, QuizTarget,
    ResultHistory, ResultScope,
};
