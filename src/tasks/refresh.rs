use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::auth::AuthSession;
use crate::schemas::exam::ExamListResponse;
use crate::services::backend::ExamBackend;

/// Periodic re-fetch of the student's exam list, owned by the view that
/// spawned it. Not a free-running interval: the refresher carries a shutdown
/// channel and a join handle, and stops when the owner says so.
pub(crate) struct ExamListRefresher {
    updates: watch::Receiver<Option<ExamListResponse>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ExamListRefresher {
    pub(crate) fn spawn(
        backend: ExamBackend,
        auth: AuthSession,
        refresh_interval: Duration,
    ) -> Self {
        let (update_tx, updates) = watch::channel(None);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(backend, auth, refresh_interval, update_tx, shutdown_rx));
        Self { updates, shutdown, task }
    }

    pub(crate) fn updates(&self) -> watch::Receiver<Option<ExamListResponse>> {
        self.updates.clone()
    }

    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                tracing::error!(error = %err, "Exam list refresher task failed");
            }
        }
    }
}

async fn run(
    backend: ExamBackend,
    auth: AuthSession,
    refresh_interval: Duration,
    updates: watch::Sender<Option<ExamListResponse>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(refresh_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match backend.active_exams(&auth).await {
                    Ok(list) => {
                        if updates.send(Some(list)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to refresh the exam list");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum::{Json, Router};

    use super::*;
    use crate::test_support::{auth_fixture, backend_for, exam_json, serve};

    #[tokio::test]
    async fn delivers_the_first_fetch_and_stops_on_request() {
        let router = Router::new().route(
            "/student/exams",
            get(|| async {
                let mut listing = exam_json();
                listing["can_start"] = serde_json::Value::Bool(true);
                Json(serde_json::json!({ "exams": [listing], "upcoming_exams": [] }))
            }),
        );
        let (base_url, server) = serve(router).await;

        let refresher = ExamListRefresher::spawn(
            backend_for(&base_url),
            auth_fixture(),
            Duration::from_secs(30),
        );
        let mut updates = refresher.updates();

        updates.changed().await.expect("first refresh");
        {
            let list = updates.borrow_and_update();
            let list = list.as_ref().expect("exam list");
            assert_eq!(list.exams.len(), 1);
            assert!(list.exams[0].can_start);
        }

        refresher.stop().await;
        server.abort();
    }
}
