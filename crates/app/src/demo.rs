use assessment_core::model::{
    Answer, ContentId, CourseId, Difficulty, LessonId, Question, QuestionError, Quiz, QuizError,
};
use backend::{BackendError, InMemoryBackend, QuizTarget};

pub const DEMO_COURSE: &str = "rust-101";
pub const DEMO_LESSON: &str = "ownership";
pub const DEMO_CONTENT: &str = "ownership-quiz";

#[must_use]
pub fn demo_target() -> QuizTarget {
    QuizTarget::lesson(
        CourseId::new(DEMO_COURSE),
        LessonId::new(DEMO_LESSON),
        ContentId::new(DEMO_CONTENT),
    )
}

fn question(
    id: &str,
    prompt: &str,
    difficulty: Difficulty,
    weight: u32,
    options: &[(&str, bool)],
    explanation: Option<&str>,
) -> Result<Question, QuestionError> {
    let answers = options
        .iter()
        .enumerate()
        .map(|(i, (text, correct))| Answer::new(format!("{id}-a{i}").as_str(), *text, *correct))
        .collect();
    Ok(Question::new(id, prompt, difficulty, weight, answers)?
        .with_explanation(explanation.map(str::to_owned)))
}

fn ownership_quiz() -> Result<Quiz, QuizError> {
    let questions = vec![
        question(
            "own-1",
            "What happens to a `String` when it is assigned to another variable?",
            Difficulty::Easy,
            1,
            &[
                ("It is moved", true),
                ("It is deep-copied", false),
                ("It is reference counted", false),
            ],
            Some("Heap-owning types move on assignment unless they implement Copy."),
        )?,
        question(
            "own-2",
            "How many mutable references to a value may exist at once?",
            Difficulty::Medium,
            1,
            &[("One", true), ("Two", false), ("Unlimited", false)],
            None,
        )?,
        question(
            "own-3",
            "Which trait runs code when a value goes out of scope?",
            Difficulty::Medium,
            1,
            &[("Drop", true), ("Clone", false), ("Deref", false), ("Default", false)],
            None,
        )?,
        question(
            "own-4",
            "Why does returning a reference to a local variable fail to compile?",
            Difficulty::Hard,
            2,
            &[
                ("The local is dropped at the end of the function", true),
                ("References cannot be returned", false),
                ("Locals live on the heap", false),
            ],
            Some("The borrow would outlive the value it points to."),
        )?,
    ];
    Quiz::new("ownership-basics", questions)
}

fn borrowing_quiz() -> Result<Quiz, QuizError> {
    let questions = vec![
        question(
            "bor-1",
            "What does `&mut` grant?",
            Difficulty::Easy,
            1,
            &[("Exclusive, writable access", true), ("Shared, read-only access", false)],
            None,
        )?,
        question(
            "bor-2",
            "When does a borrow end under non-lexical lifetimes?",
            Difficulty::Hard,
            2,
            &[
                ("After its last use", true),
                ("At the end of the enclosing block", false),
                ("When the owner is dropped", false),
            ],
            None,
        )?,
        question(
            "bor-3",
            "Can a shared and a mutable borrow of the same value overlap?",
            Difficulty::Medium,
            1,
            &[("No", true), ("Yes", false)],
            Some("Aliasing and mutation are never allowed at the same time."),
        )?,
    ];
    Quiz::new("borrowing-basics", questions)
}

/// Offline backend seeded with two quizzes at the demo location.
///
/// # Errors
///
/// Returns `BackendError` if the seed data is invalid.
pub fn seeded_backend() -> Result<InMemoryBackend, BackendError> {
    let backend = InMemoryBackend::new();
    let target = demo_target();
    backend.insert_quiz(&target, ownership_quiz()?)?;
    backend.insert_quiz(&target, borrowing_quiz()?)?;
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_core::CorrectAnswerPolicy;

    #[test]
    fn seed_quizzes_satisfy_strict_policy() {
        for quiz in [ownership_quiz().unwrap(), borrowing_quiz().unwrap()] {
            quiz.check_policy(CorrectAnswerPolicy::Strict).unwrap();
        }
    }

    #[test]
    fn seeded_backend_builds() {
        assert!(seeded_backend().is_ok());
    }
}
