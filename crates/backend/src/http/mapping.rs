use assessment_core::Submission;
use assessment_core::model::{
    Answer, AnswerId, AssessmentResult, Difficulty, DifficultyStats, GradedAnswer, Question,
    QuestionId, Quiz, QuizError, QuizId, ResultId, ScoreBreakdown,
};

use super::wire::{
    AnswerSubmitDto, DifficultyStatsDto, QuestionDto, QuizDto, ResultDto, SubmitExamDto,
    SubmitQuizDto,
};

// Questions without difficulty or weight (exam questions) count as medium, weight 1.
const DEFAULT_WEIGHT: u32 = 1;

pub(crate) fn question_from_dto(dto: QuestionDto) -> Result<Question, QuizError> {
    let difficulty = match dto.difficulty.as_deref() {
        Some(raw) => raw.parse::<Difficulty>()?,
        None => Difficulty::default(),
    };
    let answers = dto
        .answers
        .into_iter()
        .map(|a| Answer::new(AnswerId::new(a.answer_id), a.answer, a.is_correct))
        .collect();
    let question = Question::new(
        QuestionId::new(dto.question_id),
        dto.question,
        difficulty,
        dto.weight.unwrap_or(DEFAULT_WEIGHT),
        answers,
    )?;
    Ok(question.with_explanation(dto.explanation))
}

pub(crate) fn quiz_from_dto(dto: QuizDto) -> Result<Quiz, QuizError> {
    questions_into_quiz(QuizId::new(dto.quizz_id), dto.questions)
}

pub(crate) fn questions_into_quiz(id: QuizId, questions: Vec<QuestionDto>) -> Result<Quiz, QuizError> {
    let questions = questions
        .into_iter()
        .map(question_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Quiz::new(id, questions)
}

fn stats_from_dto(dto: DifficultyStatsDto) -> DifficultyStats {
    DifficultyStats {
        correct: dto.correct,
        total: dto.total,
        percentage: dto.percentage,
        weighted_score: dto.weighted_score,
        total_weight: dto.total_weight,
    }
}

/// `fallback_quiz` fills in results that omit `quizzId` (course exams).
pub(crate) fn result_from_dto(dto: ResultDto, fallback_quiz: &QuizId) -> AssessmentResult {
    let by_difficulty = dto.score_analysis.unwrap_or_default().breakdown.by_difficulty;
    let breakdown = ScoreBreakdown {
        easy: stats_from_dto(by_difficulty.easy),
        medium: stats_from_dto(by_difficulty.medium),
        hard: stats_from_dto(by_difficulty.hard),
    };
    let quiz_id = dto
        .quizz_id
        .map_or_else(|| fallback_quiz.clone(), QuizId::new);

    let mut result = AssessmentResult::new(quiz_id, dto.score, breakdown);
    result.id = dto.store_id.map(ResultId::new);
    result.created_at = dto.created_at;
    result.answers = dto
        .answers
        .into_iter()
        .map(|a| GradedAnswer {
            question_id: QuestionId::new(a.question_id),
            answer_id: a.answer_id.map(AnswerId::new),
            is_correct: a.is_correct,
        })
        .collect();
    result
}

fn answers_to_dto(submission: &Submission) -> Vec<AnswerSubmitDto<'_>> {
    submission
        .answers
        .iter()
        .map(|a| AnswerSubmitDto {
            question_id: a.question_id.as_str(),
            answer_id: a.answer_id.as_str(),
        })
        .collect()
}

pub(crate) fn quiz_submission_to_dto(submission: &Submission) -> SubmitQuizDto<'_> {
    SubmitQuizDto {
        quizz_id: submission.quiz_id.as_str(),
        answers: answers_to_dto(submission),
    }
}

pub(crate) fn exam_submission_to_dto<'a>(
    course_id: &'a str,
    submission: &'a Submission,
) -> SubmitExamDto<'a> {
    SubmitExamDto {
        course_id,
        answers: answers_to_dto(submission),
    }
}
