//! JSON shapes exchanged with the course platform API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuizDto {
    pub quizz_id: String,
    #[serde(default)]
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionDto {
    pub question_id: String,
    pub question: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub answers: Vec<AnswerDto>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerDto {
    pub answer_id: String,
    pub answer: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerSubmitDto<'a> {
    pub question_id: &'a str,
    pub answer_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitQuizDto<'a> {
    pub quizz_id: &'a str,
    pub answers: Vec<AnswerSubmitDto<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitExamDto<'a> {
    pub course_id: &'a str,
    pub answers: Vec<AnswerSubmitDto<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct DifficultyStatsDto {
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
    pub weighted_score: f64,
    pub total_weight: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ByDifficultyDto {
    pub easy: DifficultyStatsDto,
    pub medium: DifficultyStatsDto,
    pub hard: DifficultyStatsDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BreakdownDto {
    pub by_difficulty: ByDifficultyDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ScoreAnalysisDto {
    pub breakdown: BreakdownDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradedAnswerDto {
    pub question_id: String,
    #[serde(default)]
    pub answer_id: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultDto {
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub quizz_id: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub answers: Vec<GradedAnswerDto>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score_analysis: Option<ScoreAnalysisDto>,
}

/// Some endpoints wrap payloads in `{success, data, message}`, others return
/// the bare value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Payload<T> {
    Envelope {
        success: bool,
        data: Option<T>,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

/// Result lists arrive as an array or, for a single stored result, a lone object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBodyDto {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl ErrorBodyDto {
    /// NestJS-style bodies carry either a string or a list of strings.
    pub fn into_message(self) -> Option<String> {
        match self.message? {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        }
    }
}
