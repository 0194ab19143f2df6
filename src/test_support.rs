use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::core::auth::AuthSession;
use crate::schemas::auth::UserDto;
use crate::services::backend::ExamBackend;

/// Serves `router` on an ephemeral local port and returns the base URL plus
/// the server task. Tests abort the task when they are done with it.
pub(crate) async fn serve(router: Router) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve test backend");
    });
    (format!("http://{addr}"), handle)
}

pub(crate) fn backend_for(base_url: &str) -> ExamBackend {
    ExamBackend::new(base_url, Duration::from_secs(5)).expect("test backend client")
}

pub(crate) fn auth_fixture() -> AuthSession {
    AuthSession::new(
        "test-token".to_string(),
        UserDto {
            id: 2,
            email: "ayse@example.edu".to_string(),
            role: "student".to_string(),
            name: "Ayşe".to_string(),
        },
    )
}

pub(crate) fn exam_json() -> serde_json::Value {
    serde_json::json!({
        "id": 7,
        "course_id": 3,
        "exam_type": "vize",
        "start_time": "2025-11-08T10:00:00Z",
        "end_time": "2025-11-08T12:00:00Z",
        "duration_minutes": 60,
        "weight_percentage": 40.0,
        "course": {"id": 3, "code": "BLG202", "name": "Data Structures"}
    })
}

pub(crate) fn questions_json() -> serde_json::Value {
    serde_json::json!([
        {
            "id": 1,
            "exam_id": 7,
            "question_text": "2 + 2 = ?",
            "question_type": "multiple_choice",
            "points": 2.5,
            "answer_options": [
                {"id": 11, "question_id": 1, "option_text": "3"},
                {"id": 12, "question_id": 1, "option_text": "4"}
            ]
        },
        {
            "id": 2,
            "exam_id": 7,
            "question_text": "3 * 3 = ?",
            "question_type": "multiple_choice",
            "points": 2.5,
            "answer_options": [
                {"id": 21, "question_id": 2, "option_text": "9"},
                {"id": 22, "question_id": 2, "option_text": "6"}
            ]
        }
    ])
}
