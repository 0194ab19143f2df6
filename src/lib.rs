pub(crate) mod cli;
pub(crate) mod core;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use anyhow::Context;

use crate::core::{config::Settings, telemetry};
use crate::services::backend::ExamBackend;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let backend = ExamBackend::from_settings(&settings)?;

    let credentials = settings.credentials();
    anyhow::ensure!(
        !credentials.email.is_empty() && !credentials.password.is_empty(),
        "EXAMPORT_EMAIL and EXAMPORT_PASSWORD must be set to log in"
    );
    let auth =
        backend.login(&credentials.email, &credentials.password).await.context("Login failed")?;
    tracing::info!(
        user_id = auth.user().id,
        role = %auth.user().role,
        "Logged in to the exam portal"
    );
    println!("Signed in as {} <{}>", auth.user().name, auth.user().email);

    match exam_id_arg()? {
        Some(exam_id) => cli::take_exam(backend, auth, exam_id).await,
        None => cli::watch_exams(backend, auth, &settings).await,
    }
}

fn exam_id_arg() -> anyhow::Result<Option<i64>> {
    match std::env::args().nth(1) {
        Some(raw) => {
            let exam_id = raw.parse::<i64>().with_context(|| format!("invalid exam id: {raw}"))?;
            Ok(Some(exam_id))
        }
        None => Ok(None),
    }
}
