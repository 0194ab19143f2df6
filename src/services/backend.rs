use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::auth::AuthSession;
use crate::core::config::Settings;
use crate::schemas::attempt::{
    ExamDetailsResponse, ExamResultResponse, StartExamResponse, SubmitRequest, SubmitResponse,
};
use crate::schemas::auth::{LoginRequest, LoginResponse, ServerTimeResponse};
use crate::schemas::exam::ExamListResponse;
use crate::schemas::ErrorBody;
use crate::services::attempt::AttemptStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Machine-readable conflict code the backend attaches when a start request
/// hits an existing attempt. A bare 400 without this code is a real
/// rejection, never a resume signal.
const ATTEMPT_EXISTS_CODE: &str = "attempt_exists";

#[derive(Debug, Error)]
pub(crate) enum BackendError {
    #[error("an attempt already exists for this exam")]
    AttemptExists,
    #[error("not authorized; the session token is invalid or expired")]
    Unauthorized,
    #[error("{detail} (status {status})")]
    Rejected { status: u16, detail: String },
    #[error("failed to reach the exam backend: {0}")]
    Transport(#[from] reqwest::Error),
}

/// REST client for the exam portal. Holds no credentials of its own; every
/// authenticated call receives the `AuthSession` explicitly.
#[derive(Debug, Clone)]
pub(crate) struct ExamBackend {
    client: Client,
    base_url: String,
}

impl ExamBackend {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(
            &settings.server().base_url,
            Duration::from_secs(settings.http().timeout_seconds),
        )
    }

    pub(crate) fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .context("Failed to build exam backend HTTP client")?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub(crate) async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let response = self
            .client
            .post(self.endpoint("/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let body: LoginResponse = decode(response).await?;
        Ok(AuthSession::new(body.access_token, body.user))
    }

    /// Authoritative Istanbul wall clock, as a naive `YYYY-MM-DDTHH:MM`
    /// string. Decoding it into an instant is the caller's job, through the
    /// wall-clock codec.
    pub(crate) async fn istanbul_now(&self) -> Result<String, BackendError> {
        let response = self.client.get(self.endpoint("/auth/time")).send().await?;
        let body: ServerTimeResponse = decode(response).await?;
        Ok(body.istanbul_time)
    }

    pub(crate) async fn active_exams(
        &self,
        auth: &AuthSession,
    ) -> Result<ExamListResponse, BackendError> {
        let response = self
            .client
            .get(self.endpoint("/student/exams"))
            .bearer_auth(auth.token())
            .send()
            .await?;
        decode(response).await
    }

    pub(crate) async fn exam_result(
        &self,
        auth: &AuthSession,
        exam_id: i64,
    ) -> Result<ExamResultResponse, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/student/exams/{exam_id}/result")))
            .bearer_auth(auth.token())
            .send()
            .await?;
        decode(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AttemptStore for ExamBackend {
    async fn start_exam(
        &self,
        auth: &AuthSession,
        exam_id: i64,
    ) -> Result<StartExamResponse, BackendError> {
        let response = self
            .client
            .post(self.endpoint(&format!("/student/exams/{exam_id}/start")))
            .bearer_auth(auth.token())
            .send()
            .await?;
        decode(response).await
    }

    async fn exam_details(
        &self,
        auth: &AuthSession,
        exam_id: i64,
    ) -> Result<ExamDetailsResponse, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/student/exams/{exam_id}")))
            .bearer_auth(auth.token())
            .send()
            .await?;
        decode(response).await
    }

    async fn submit_exam(
        &self,
        auth: &AuthSession,
        exam_id: i64,
        request: &SubmitRequest,
    ) -> Result<SubmitResponse, BackendError> {
        let response = self
            .client
            .post(self.endpoint(&format!("/student/exams/{exam_id}/submit")))
            .bearer_auth(auth.token())
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    Err(error_from(status, response.json::<ErrorBody>().await.ok()))
}

fn error_from(status: StatusCode, body: Option<ErrorBody>) -> BackendError {
    if status == StatusCode::CONFLICT {
        return BackendError::AttemptExists;
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY) {
        return BackendError::Unauthorized;
    }
    if let Some(body) = &body {
        if status.is_client_error() && body.code.as_deref() == Some(ATTEMPT_EXISTS_CODE) {
            return BackendError::AttemptExists;
        }
    }

    let detail = body.map(|body| body.error).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or("request rejected").to_string()
    });
    BackendError::Rejected { status: status.as_u16(), detail }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::test_support::{backend_for, exam_json, questions_json, serve};

    #[test]
    fn conflict_status_maps_to_attempt_exists() {
        let err = error_from(StatusCode::CONFLICT, None);
        assert!(matches!(err, BackendError::AttemptExists));
    }

    #[test]
    fn conflict_code_maps_to_attempt_exists_regardless_of_status() {
        let body = ErrorBody {
            error: "Bu sınava zaten giriş yaptınız".to_string(),
            code: Some("attempt_exists".to_string()),
        };
        let err = error_from(StatusCode::BAD_REQUEST, Some(body));
        assert!(matches!(err, BackendError::AttemptExists));
    }

    #[test]
    fn other_client_errors_stay_rejections() {
        let body = ErrorBody {
            error: "Sınav zamanı dışında".to_string(),
            code: Some("window_closed".to_string()),
        };
        let err = error_from(StatusCode::BAD_REQUEST, Some(body));
        match err {
            BackendError::Rejected { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Sınav zamanı dışında");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_statuses_invalidate_the_session() {
        assert!(matches!(error_from(StatusCode::UNAUTHORIZED, None), BackendError::Unauthorized));
        assert!(matches!(
            error_from(StatusCode::UNPROCESSABLE_ENTITY, None),
            BackendError::Unauthorized
        ));
    }

    #[tokio::test]
    async fn login_builds_an_auth_session() {
        let router = Router::new().route(
            "/auth/login",
            post(|| async {
                Json(serde_json::json!({
                    "access_token": "token-123",
                    "user": {"id": 2, "email": "ayse@example.edu", "role": "student", "name": "Ayşe"}
                }))
            }),
        );
        let (base_url, server) = serve(router).await;

        let backend = backend_for(&base_url);
        let auth = backend.login("ayse@example.edu", "secret").await.expect("login");
        assert_eq!(auth.token(), "token-123");
        assert_eq!(auth.user().id, 2);

        server.abort();
    }

    #[tokio::test]
    async fn istanbul_now_returns_the_naive_string() {
        let router = Router::new().route(
            "/auth/time",
            get(|| async {
                Json(serde_json::json!({
                    "istanbul_time": "2025-11-08T13:23",
                    "timezone": "Europe/Istanbul",
                    "utc_offset": "+03:00"
                }))
            }),
        );
        let (base_url, server) = serve(router).await;

        let backend = backend_for(&base_url);
        assert_eq!(backend.istanbul_now().await.expect("server time"), "2025-11-08T13:23");

        server.abort();
    }

    #[tokio::test]
    async fn start_conflict_surfaces_as_attempt_exists() {
        let router = Router::new().route(
            "/student/exams/7/start",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": "Bu sınava zaten giriş yaptınız",
                        "code": "attempt_exists"
                    })),
                )
            }),
        );
        let (base_url, server) = serve(router).await;

        let backend = backend_for(&base_url);
        let auth = crate::test_support::auth_fixture();
        let err = backend.start_exam(&auth, 7).await.unwrap_err();
        assert!(matches!(err, BackendError::AttemptExists));

        server.abort();
    }

    #[tokio::test]
    async fn submit_sends_the_complete_payload_with_nulls() {
        let captured: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route(
                "/student/exams/7/submit",
                post(
                    |State(captured): State<Arc<Mutex<Option<serde_json::Value>>>>,
                     Json(body): Json<serde_json::Value>| async move {
                        *captured.lock().expect("capture lock") = Some(body);
                        Json(serde_json::json!({
                            "message": "Sınav başarıyla gönderildi",
                            "attempt": {
                                "id": 5,
                                "exam_id": 7,
                                "student_id": 2,
                                "start_time": "2025-11-08T10:05:00Z",
                                "submitted_at": "2025-11-08T10:25:00Z",
                                "total_score": 12.5
                            }
                        }))
                    },
                ),
            )
            .with_state(captured.clone());
        let (base_url, server) = serve(router).await;

        let backend = backend_for(&base_url);
        let auth = crate::test_support::auth_fixture();
        let request = SubmitRequest {
            answers: vec![
                crate::schemas::attempt::AnswerEntry { question_id: 1, selected_option_id: Some(11) },
                crate::schemas::attempt::AnswerEntry { question_id: 2, selected_option_id: None },
            ],
        };

        let response = backend.submit_exam(&auth, 7, &request).await.expect("submit");
        assert!(response.attempt.submitted_at.is_some());

        let body = captured.lock().expect("capture lock").take().expect("captured body");
        let answers = body["answers"].as_array().expect("answers array");
        assert_eq!(answers.len(), 2);
        assert!(answers[1].get("selected_option_id").expect("entry present").is_null());

        server.abort();
    }

    #[tokio::test]
    async fn fresh_start_decodes_exam_and_questions() {
        let router = Router::new().route(
            "/student/exams/7/start",
            post(|| async {
                Json(serde_json::json!({
                    "message": "Sınav başlatıldı",
                    "exam": exam_json(),
                    "attempt": {
                        "id": 5,
                        "exam_id": 7,
                        "student_id": 2,
                        "start_time": "2025-11-08T10:05:00Z",
                        "submitted_at": null,
                        "total_score": 0.0
                    },
                    "questions": questions_json(),
                    "duration_minutes": 60
                }))
            }),
        );
        let (base_url, server) = serve(router).await;

        let backend = backend_for(&base_url);
        let auth = crate::test_support::auth_fixture();
        let response = backend.start_exam(&auth, 7).await.expect("start");
        assert_eq!(response.exam.id, 7);
        assert_eq!(response.questions.len(), 2);
        assert!(response.questions[0].selected_option_id.is_none());

        server.abort();
    }
}
