use super::*;
use crate::config::{CorrectAnswerPolicy, SessionConfig, SubmitGate};
use crate::model::{
    Answer, AnswerId, AssessmentResult, Difficulty, Question, QuestionId, Quiz, QuizError,
    ScoreBreakdown,
};
use crate::time::fixed_now;

fn question(id: &str, difficulty: Difficulty, weight: u32) -> Question {
    Question::new(
        id,
        format!("Prompt {id}"),
        difficulty,
        weight,
        vec![
            Answer::new(format!("{id}-a").as_str(), "Alpha", true),
            Answer::new(format!("{id}-b").as_str(), "Beta", false),
        ],
    )
    .unwrap()
}

fn quiz() -> Quiz {
    Quiz::new(
        "quiz-1",
        vec![
            question("q1", Difficulty::Easy, 1),
            question("q2", Difficulty::Medium, 1),
            question("q3", Difficulty::Hard, 2),
        ],
    )
    .unwrap()
}

fn config(duration_secs: u32) -> SessionConfig {
    SessionConfig::default().with_duration_secs(duration_secs).unwrap()
}

fn started(config: SessionConfig) -> Session {
    let mut session = Session::new(config);
    session.load(quiz()).unwrap();
    session.start(fixed_now()).unwrap();
    session
}

fn qid(id: &str) -> QuestionId {
    QuestionId::new(id)
}

fn aid(id: &str) -> AnswerId {
    AnswerId::new(id)
}

fn result() -> AssessmentResult {
    AssessmentResult::new(crate::model::QuizId::new("quiz-1"), 75.0, ScoreBreakdown::default())
}

#[test]
fn start_requires_loaded_questions() {
    let mut session = Session::new(SessionConfig::default());
    assert_eq!(session.start(fixed_now()), Err(SessionError::NotLoaded));

    session.load(quiz()).unwrap();
    session.start(fixed_now()).unwrap();
    assert_eq!(session.phase(), Phase::InProgress);
    assert_eq!(session.started_at(), Some(fixed_now()));
    assert_eq!(session.remaining_secs(), 1800);
}

#[test]
fn strict_policy_rejects_ambiguous_question_at_load() {
    let ambiguous = Question::new(
        "q1",
        "P",
        Difficulty::Easy,
        1,
        vec![Answer::new("a", "x", true), Answer::new("b", "y", true)],
    )
    .unwrap();
    let quiz = Quiz::new("quiz", vec![ambiguous]).unwrap();

    let mut strict = Session::new(SessionConfig::default());
    assert!(matches!(strict.load(quiz.clone()), Err(SessionError::Quiz(QuizError::Question(_)))));
    assert!(!strict.is_loaded());

    let mut lenient = Session::new(
        SessionConfig::default().with_correct_answer_policy(CorrectAnswerPolicy::FirstFlagged),
    );
    lenient.load(quiz).unwrap();
    assert!(lenient.is_loaded());
}

#[test]
fn reselecting_overwrites_and_same_selection_is_a_no_op() {
    let mut session = started(SessionConfig::default());

    assert_eq!(session.select_answer(&qid("q1"), aid("q1-a")), Ok(true));
    assert_eq!(session.select_answer(&qid("q1"), aid("q1-a")), Ok(false));
    assert_eq!(session.select_answer(&qid("q1"), aid("q1-b")), Ok(true));

    assert_eq!(session.answered_count(), 1);
    assert_eq!(session.selection_for(&qid("q1")), Some(&aid("q1-b")));
}

#[test]
fn selection_must_belong_to_the_question() {
    let mut session = started(SessionConfig::default());

    assert_eq!(
        session.select_answer(&qid("q1"), aid("q2-a")),
        Err(SessionError::UnknownAnswer {
            question_id: qid("q1"),
            answer_id: aid("q2-a"),
        })
    );
    assert_eq!(
        session.select_answer(&qid("nope"), aid("q1-a")),
        Err(SessionError::UnknownQuestion(qid("nope")))
    );
    assert_eq!(session.answered_count(), 0);
}

#[test]
fn navigation_is_free_and_bounded() {
    let mut session = started(SessionConfig::default());

    session.navigate(2).unwrap();
    assert!(session.is_last_question());
    assert_eq!(session.next(), Ok(2));

    assert_eq!(
        session.navigate(3),
        Err(SessionError::IndexOutOfRange { index: 3, len: 3 })
    );
    assert_eq!(session.current_index(), 2);

    session.navigate(0).unwrap();
    assert_eq!(session.previous(), Ok(0));
    assert_eq!(session.next(), Ok(1));
}

#[test]
fn manual_submit_with_no_answers_is_rejected_locally() {
    let mut session = started(SessionConfig::default());

    let err = session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap_err();

    assert_eq!(err, SessionError::NoAnswers);
    assert!(err.is_local_validation());
    assert_eq!(session.phase(), Phase::InProgress);
    assert!(!session.can_submit());
}

#[test]
fn all_answered_gate_requires_every_question() {
    let mut session = started(SessionConfig::default().with_submit_gate(SubmitGate::AllAnswered));
    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();

    assert_eq!(
        session.begin_submit(SubmitTrigger::Manual, fixed_now()),
        Err(SessionError::Incomplete { answered: 1, total: 3 })
    );

    session.select_answer(&qid("q2"), aid("q2-a")).unwrap();
    session.select_answer(&qid("q3"), aid("q3-b")).unwrap();
    assert!(session.can_submit());
}

#[test]
fn submission_is_dense_and_in_question_order() {
    let mut session = started(SessionConfig::default());
    session.select_answer(&qid("q3"), aid("q3-a")).unwrap();
    session.select_answer(&qid("q1"), aid("q1-b")).unwrap();

    let submission = session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();

    assert_eq!(submission.quiz_id.as_str(), "quiz-1");
    assert_eq!(submission.trigger, SubmitTrigger::Manual);
    let pairs: Vec<_> = submission
        .answers
        .iter()
        .map(|a| (a.question_id.as_str(), a.answer_id.as_str()))
        .collect();
    assert_eq!(pairs, vec![("q1", "q1-b"), ("q3", "q3-a")]);
    assert_eq!(session.phase(), Phase::Submitting);
    assert_eq!(session.submitted_at(), Some(fixed_now()));
}

#[test]
fn second_submit_while_in_flight_is_rejected() {
    let mut session = started(SessionConfig::default());
    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();

    assert_eq!(
        session.begin_submit(SubmitTrigger::Manual, fixed_now()),
        Err(SessionError::SubmissionInFlight)
    );
    assert_eq!(
        session.select_answer(&qid("q2"), aid("q2-a")),
        Err(SessionError::SubmissionInFlight)
    );
    assert_eq!(session.reset(), Err(SessionError::SubmissionInFlight));
}

#[test]
fn failed_submit_preserves_selections_and_time() {
    let mut session = started(config(60));
    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.navigate(1).unwrap();
    for _ in 0..10 {
        session.tick();
    }

    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    session.fail_submit("network down").unwrap();

    assert_eq!(session.phase(), Phase::InProgress);
    assert_eq!(session.last_error(), Some("network down"));
    assert_eq!(session.selection_for(&qid("q1")), Some(&aid("q1-a")));
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.remaining_secs(), 50);
    assert_eq!(session.submitted_at(), None);

    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    assert_eq!(session.last_error(), None);
}

#[test]
fn ticks_only_count_down_while_in_progress() {
    let mut session = Session::new(config(3));
    session.load(quiz()).unwrap();
    assert_eq!(session.tick(), TickOutcome::Idle);

    session.start(fixed_now()).unwrap();
    assert_eq!(session.tick(), TickOutcome::Running { remaining_secs: 2 });

    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    assert_eq!(session.tick(), TickOutcome::Idle);
    assert_eq!(session.remaining_secs(), 2);
}

#[test]
fn expiry_fires_exactly_once() {
    let mut session = started(config(2));

    assert_eq!(session.tick(), TickOutcome::Running { remaining_secs: 1 });
    assert_eq!(session.tick(), TickOutcome::Expired);
    assert!(session.is_expired());
    assert_eq!(session.tick(), TickOutcome::Idle);
    assert_eq!(session.remaining_secs(), 0);
}

#[test]
fn timeout_submit_bypasses_the_gate() {
    let mut session = started(config(1).with_submit_gate(SubmitGate::AllAnswered));
    assert_eq!(session.tick(), TickOutcome::Expired);

    let submission = session.begin_submit(SubmitTrigger::Timeout, fixed_now()).unwrap();

    assert!(submission.answers.is_empty());
    assert_eq!(submission.trigger, SubmitTrigger::Timeout);
}

#[test]
fn expired_session_does_not_restart_the_countdown_after_failure() {
    let mut session = started(config(1));
    session.tick();
    session.begin_submit(SubmitTrigger::Timeout, fixed_now()).unwrap();
    session.fail_submit("timeout").unwrap();

    assert!(session.is_expired());
    assert_eq!(session.tick(), TickOutcome::Idle);

    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    assert!(session.begin_submit(SubmitTrigger::Manual, fixed_now()).is_ok());
}

#[test]
fn manual_retry_after_expiry_skips_the_all_answered_gate() {
    let mut session = started(config(1).with_submit_gate(SubmitGate::AllAnswered));
    session.select_answer(&qid("q2"), aid("q2-a")).unwrap();
    assert_eq!(session.tick(), TickOutcome::Expired);
    session.begin_submit(SubmitTrigger::Timeout, fixed_now()).unwrap();
    session.fail_submit("request timed out").unwrap();

    assert!(session.can_submit());
    let retry = session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    assert_eq!(retry.answers.len(), 1);
    assert_eq!(retry.trigger, SubmitTrigger::Manual);
}

#[test]
fn manual_retry_after_expiry_is_allowed_with_no_answers() {
    let mut session = started(config(1));
    session.tick();
    session.begin_submit(SubmitTrigger::Timeout, fixed_now()).unwrap();
    session.fail_submit("request timed out").unwrap();

    let retry = session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    assert!(retry.answers.is_empty());
}

#[test]
fn cancelled_submit_returns_to_answering() {
    let mut session = started(config(60));
    session.select_answer(&qid("q3"), aid("q3-b")).unwrap();
    session.navigate(2).unwrap();
    session.tick();
    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();

    session.cancel_submit().unwrap();

    assert_eq!(session.phase(), Phase::InProgress);
    assert_eq!(session.current_index(), 2);
    assert_eq!(session.remaining_secs(), 59);
    assert_eq!(session.submitted_at(), None);
    assert!(session.last_error().is_some());
    assert!(matches!(
        session.cancel_submit(),
        Err(SessionError::InvalidPhase { .. })
    ));
    assert!(session.begin_submit(SubmitTrigger::Manual, fixed_now()).is_ok());
}

#[test]
fn completed_session_is_read_only() {
    let mut session = started(SessionConfig::default());
    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    session.complete_submit(result()).unwrap();

    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(session.result().map(|r| r.score), Some(75.0));
    assert_eq!(
        session.select_answer(&qid("q1"), aid("q1-b")),
        Err(SessionError::ReadOnly)
    );
    assert!(matches!(
        session.begin_submit(SubmitTrigger::Manual, fixed_now()),
        Err(SessionError::InvalidPhase { .. })
    ));
    assert_eq!(session.selection_for(&qid("q1")), Some(&aid("q1-a")));
}

#[test]
fn review_mode_reveals_correctness() {
    let mut session = started(SessionConfig::default());
    assert!(session.review().is_err());

    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.select_answer(&qid("q2"), aid("q2-b")).unwrap();
    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    session.complete_submit(result()).unwrap();
    session.enter_review().unwrap();

    let review = session.review().unwrap();
    assert_eq!(review.len(), 3);
    assert!(review[0].is_correct);
    assert_eq!(review[0].verdict, "You correctly identified \"Alpha\" as the right answer.");
    assert!(!review[1].is_correct);
    assert_eq!(review[1].verdict, "The correct answer is \"Alpha\".");
    assert_eq!(review[1].explanation, FALLBACK_STUDY_HINT);
    assert!(!review[2].is_answered());
    assert!(review[1].options[1].is_selected);
    assert!(review[1].options[0].is_correct);

    session.navigate(2).unwrap();
    session.exit_review().unwrap();
    assert_eq!(session.phase(), Phase::Completed);
}

#[test]
fn review_prefers_the_question_explanation() {
    let question = question("q1", Difficulty::Easy, 1)
        .with_explanation(Some("Alpha comes first.".to_owned()));

    let review = review_question(&question, Some(&aid("q1-b")));

    assert_eq!(review.explanation, "Alpha comes first.");
}

#[test]
fn reset_clears_the_attempt_but_keeps_questions() {
    let mut session = started(config(10));
    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.navigate(2).unwrap();
    session.tick();
    session.begin_submit(SubmitTrigger::Manual, fixed_now()).unwrap();
    session.complete_submit(result()).unwrap();

    session.reset().unwrap();

    assert_eq!(session.phase(), Phase::NotStarted);
    assert_eq!(session.answered_count(), 0);
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.remaining_secs(), 10);
    assert!(session.result().is_none());
    assert!(!session.is_expired());
    assert_eq!(session.total_questions(), 3);

    session.unload().unwrap();
    assert!(!session.is_loaded());
    session.load(quiz()).unwrap();
}

#[test]
fn estimate_tracks_current_selections() {
    let mut session = started(SessionConfig::default());
    session.select_answer(&qid("q1"), aid("q1-a")).unwrap();
    session.select_answer(&qid("q3"), aid("q3-a")).unwrap();

    let estimate = session.estimate();

    assert_eq!(estimate.correct, 2);
    assert_eq!(estimate.weighted_percentage, 75);
}
