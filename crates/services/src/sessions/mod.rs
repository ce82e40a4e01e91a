mod controller;
mod progress;
mod timer;
mod view;

// Public API of the assessment session subsystem.
pub use controller::{AssessmentController, TickEvent};
pub use progress::{AssessmentProgress, QuestionStatus};
pub use timer::{Countdown, TICK_PERIOD};
pub use view::{DifficultyLine, OptionView, QuestionView, ResultView};
