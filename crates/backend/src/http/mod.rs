use std::env;
use std::time::Duration;

use assessment_core::Submission;
use assessment_core::model::{AssessmentResult, Quiz, QuizId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::repository::{
    AnswerScorer, BackendError, QuestionSource, QuizTarget, ResultHistory, ResultScope,
};

mod mapping;
mod wire;

use wire::{ErrorBodyDto, OneOrMany, Payload, QuestionDto, QuizDto, ResultDto};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for the course platform API.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `BackendError::Config` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base_url =
            Url::parse(base_url.trim()).map_err(|e| BackendError::Config(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(BackendError::Config(format!(
                "{base_url}: expected an http(s) base URL"
            )));
        }
        Ok(Self {
            base_url,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Read `ASSESSMENT_API_URL` and `ASSESSMENT_API_TOKEN`.
    ///
    /// Returns `Ok(None)` when no API URL is configured.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the configured URL is invalid.
    pub fn from_env() -> Result<Option<Self>, BackendError> {
        let Some(base_url) = env::var("ASSESSMENT_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let token = env::var("ASSESSMENT_API_TOKEN").ok();
        Self::new(&base_url).map(|config| Some(config.with_token(token)))
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Base URL with `segments` appended, each percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the base URL cannot take path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Config(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// `reqwest`-backed implementation of every backend contract.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ApiConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let request = match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "backend request failed");
            transport_error(&e)
        })?;

        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await.map_err(|e| transport_error(&e))?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "backend response");

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "backend returned an error status");
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Serialization(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, BackendError> {
        let url = self.config.endpoint(segments)?;
        debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn post<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, BackendError> {
        let url = self.config.endpoint(segments)?;
        debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }
}

fn transport_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Connection(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound,
        _ => BackendError::Status {
            status: status.as_u16(),
            message: serde_json::from_str::<ErrorBodyDto>(body)
                .ok()
                .and_then(ErrorBodyDto::into_message),
        },
    }
}

/// Unwrap a `{success, data, message}` envelope, or take a bare payload as-is.
fn unwrap_payload<T>(payload: Payload<T>) -> Result<T, BackendError> {
    match payload {
        Payload::Bare(value) => Ok(value),
        Payload::Envelope {
            success: true,
            data: Some(value),
            ..
        } => Ok(value),
        Payload::Envelope { message, .. } => Err(BackendError::Rejected(
            message.unwrap_or_else(|| "request was not successful".to_owned()),
        )),
    }
}

fn results_from_payload(
    payload: Payload<OneOrMany<ResultDto>>,
    fallback_quiz: &QuizId,
) -> Result<Vec<AssessmentResult>, BackendError> {
    Ok(unwrap_payload(payload)?
        .into_vec()
        .into_iter()
        .map(|dto| mapping::result_from_dto(dto, fallback_quiz))
        .collect())
}

/// Quiz id used for course exams, which have no quiz of their own.
fn exam_quiz_id(course: &str) -> QuizId {
    QuizId::new(format!("exam-{course}"))
}

#[async_trait]
impl QuestionSource for HttpBackend {
    async fn fetch_quiz(&self, target: &QuizTarget) -> Result<Quiz, BackendError> {
        match target {
            QuizTarget::Lesson {
                course,
                lesson,
                content,
                quiz,
            } => {
                let pick = quiz.as_ref().map_or("random", |q| q.as_str());
                let payload: Payload<QuizDto> = self
                    .get(&[
                        "api",
                        "courses",
                        course.as_str(),
                        "lessons",
                        lesson.as_str(),
                        "contents",
                        content.as_str(),
                        "quizzes",
                        pick,
                    ])
                    .await?;
                Ok(mapping::quiz_from_dto(unwrap_payload(payload)?)?)
            }
            QuizTarget::CourseExam { course } => {
                let payload: Payload<Vec<QuestionDto>> = self
                    .get(&["api", "users", "user", "questions", course.as_str()])
                    .await?;
                let questions = unwrap_payload(payload)?;
                Ok(mapping::questions_into_quiz(
                    exam_quiz_id(course.as_str()),
                    questions,
                )?)
            }
        }
    }
}

#[async_trait]
impl AnswerScorer for HttpBackend {
    async fn submit(
        &self,
        target: &QuizTarget,
        submission: &Submission,
    ) -> Result<AssessmentResult, BackendError> {
        let payload: Payload<OneOrMany<ResultDto>> = match target {
            QuizTarget::Lesson {
                course,
                lesson,
                content,
                ..
            } => {
                self.post(
                    &[
                        "api",
                        "courses",
                        course.as_str(),
                        "lessons",
                        lesson.as_str(),
                        "contents",
                        content.as_str(),
                        "quizzes",
                        submission.quiz_id.as_str(),
                        "submit",
                    ],
                    &mapping::quiz_submission_to_dto(submission),
                )
                .await?
            }
            QuizTarget::CourseExam { course } => {
                self.post(
                    &["api", "users", "user", "submit"],
                    &mapping::exam_submission_to_dto(course.as_str(), submission),
                )
                .await?
            }
        };

        results_from_payload(payload, &submission.quiz_id)?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Rejected("scoring service returned no result".into()))
    }
}

#[async_trait]
impl ResultHistory for HttpBackend {
    async fn results(&self, scope: &ResultScope) -> Result<Vec<AssessmentResult>, BackendError> {
        let (segments, fallback): (Vec<&str>, QuizId) = match scope {
            ResultScope::All => (vec!["api", "user", "quiz-results"], QuizId::new("unknown")),
            ResultScope::Course(course) => (
                vec!["api", "user", "quiz-results", "courses", course.as_str()],
                exam_quiz_id(course.as_str()),
            ),
            ResultScope::Lesson { course, lesson } => (
                vec![
                    "api",
                    "user",
                    "quiz-results",
                    "courses",
                    course.as_str(),
                    "lessons",
                    lesson.as_str(),
                ],
                QuizId::new("unknown"),
            ),
            ResultScope::Content {
                course,
                lesson,
                content,
            } => (
                vec![
                    "api",
                    "courses",
                    course.as_str(),
                    "lessons",
                    lesson.as_str(),
                    "contents",
                    content.as_str(),
                    "quizzes",
                    "results",
                ],
                QuizId::new("unknown"),
            ),
        };

        let payload: Payload<OneOrMany<ResultDto>> = self.get(&segments).await?;
        let mut results = results_from_payload(payload, &fallback)?;
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let config = ApiConfig::new("https://api.example.com/").unwrap();
        let url = config
            .endpoint(&["api", "courses", "c 1", "lessons", "l/2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/courses/c%201/lessons/l%2F2"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let config = ApiConfig::new("http://localhost:8080/v1").unwrap();
        let url = config.endpoint(&["api", "user", "quiz-results"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/api/user/quiz-results");
    }

    #[test]
    fn rejects_non_http_base_urls() {
        assert!(matches!(ApiConfig::new("not a url"), Err(BackendError::Config(_))));
        assert!(matches!(
            ApiConfig::new("mailto:someone@example.com"),
            Err(BackendError::Config(_))
        ));
    }

    #[test]
    fn blank_token_is_dropped() {
        let config = ApiConfig::new("https://api.example.com")
            .unwrap()
            .with_token(Some("  ".into()));
        assert!(!config.has_token());
    }

    #[test]
    fn status_errors_map_to_backend_errors() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            BackendError::Unauthorized
        ));
        assert!(matches!(status_error(StatusCode::NOT_FOUND, ""), BackendError::NotFound));
        match status_error(
            StatusCode::BAD_REQUEST,
            r#"{"message": ["answers must be an array"], "statusCode": 400}"#,
        ) {
            BackendError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message.as_deref(), Some("answers must be an array"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unsuccessful_envelope_is_rejected_with_message() {
        let payload: Payload<QuizDto> =
            serde_json::from_str(r#"{"success": false, "message": "quiz not published"}"#).unwrap();
        match unwrap_payload(payload) {
            Err(BackendError::Rejected(message)) => assert_eq!(message, "quiz not published"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn envelope_without_data_deserializes_for_non_default_payloads() {
        let payload: Payload<OneOrMany<ResultDto>> =
            serde_json::from_str(r#"{"success": true}"#).unwrap();
        match results_from_payload(payload, &QuizId::new("quiz")) {
            Err(BackendError::Rejected(message)) => {
                assert_eq!(message, "request was not successful");
            }
            other => panic!("unexpected {other:?}"),
        }

        let payload: Payload<QuizDto> = serde_json::from_str(
            r#"{"success": true, "data": {"quizzId": "q-1", "questions": []}}"#,
        )
        .unwrap();
        assert!(matches!(payload, Payload::Envelope { data: Some(_), .. }));
    }
}
