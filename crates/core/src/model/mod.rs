pub mod ids;
mod question;
mod result;

pub use ids::{AnswerId, ContentId, CourseId, LessonId, ParseIdError, QuestionId, QuizId, ResultId};

pub use question::{Answer, Difficulty, Question, QuestionError, Quiz, QuizError};
pub use result::{AssessmentResult, DifficultyStats, GradedAnswer, ScoreBreakdown};
