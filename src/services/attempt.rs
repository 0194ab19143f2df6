use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::auth::AuthSession;
use crate::core::clock::ClockReading;
use crate::core::time::minutes_between;
use crate::schemas::attempt::{
    AnswerEntry, AttemptDto, AttemptStatus, ExamDetailsResponse, StartExamResponse, SubmitRequest,
    SubmitResponse,
};
use crate::schemas::exam::{ExamDto, QuestionDto};
use crate::services::backend::BackendError;
use crate::services::window::{self, WindowState};

/// Persistence boundary for attempts. The backend owns all durable attempt
/// state; the session only ever starts, fetches, and submits through it.
#[async_trait]
pub(crate) trait AttemptStore: Send + Sync {
    async fn start_exam(
        &self,
        auth: &AuthSession,
        exam_id: i64,
    ) -> Result<StartExamResponse, BackendError>;

    async fn exam_details(
        &self,
        auth: &AuthSession,
        exam_id: i64,
    ) -> Result<ExamDetailsResponse, BackendError>;

    async fn submit_exam(
        &self,
        auth: &AuthSession,
        exam_id: i64,
        request: &SubmitRequest,
    ) -> Result<SubmitResponse, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    Uninitialized,
    Resolving,
    Active,
    Submitting,
    Submitted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitReason {
    Manual,
    TimerExpired,
}

impl SubmitReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SubmitReason::Manual => "manual",
            SubmitReason::TimerExpired => "timer_expired",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("exam is not currently available (window is {0:?})")]
    WindowViolation(WindowState),
    #[error("failed to start the exam: {0}")]
    Initialization(#[source] BackendError),
    #[error("failed to submit the exam: {0}")]
    Submission(#[source] BackendError),
}

/// Everything a resolved attempt contributes to the session, fresh-start and
/// resume paths alike.
#[derive(Debug)]
struct Resolution {
    exam: ExamDto,
    attempt: AttemptDto,
    questions: Vec<QuestionDto>,
    answers: BTreeMap<i64, i64>,
    resumed: bool,
}

/// One student's in-progress run at one exam.
///
/// The session is exclusively owned by the view presenting the exam and is
/// discarded, not reused, when the student leaves the screen. All state
/// transitions run on the owner's single task; the phase check is the sole
/// serialization point for the two network operations.
pub(crate) struct AttemptSession<S: AttemptStore> {
    store: S,
    auth: AuthSession,
    exam: ExamDto,
    phase: SessionPhase,
    /// Bumped by `abandon`; a resolution carrying an older epoch is stale and
    /// must be discarded instead of applied.
    epoch: u64,
    attempt: Option<AttemptDto>,
    questions: Vec<QuestionDto>,
    answers: BTreeMap<i64, i64>,
    cursor: usize,
    remaining_minutes: i64,
}

impl<S: AttemptStore> AttemptSession<S> {
    pub(crate) fn new(store: S, auth: AuthSession, exam: ExamDto) -> Self {
        Self {
            store,
            auth,
            exam,
            phase: SessionPhase::Uninitialized,
            epoch: 0,
            attempt: None,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            cursor: 0,
            remaining_minutes: 0,
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn exam(&self) -> &ExamDto {
        &self.exam
    }

    pub(crate) fn attempt_id(&self) -> Option<i64> {
        self.attempt.as_ref().map(|attempt| attempt.id)
    }

    pub(crate) fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn current_question(&self) -> Option<&QuestionDto> {
        self.questions.get(self.cursor)
    }

    pub(crate) fn selected_option(&self, question_id: i64) -> Option<i64> {
        self.answers.get(&question_id).copied()
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub(crate) fn unanswered_count(&self) -> usize {
        self.questions.len().saturating_sub(self.answers.len())
    }

    /// Countdown length for this attempt, valid once the session is ready.
    pub(crate) fn remaining_minutes(&self) -> i64 {
        self.remaining_minutes
    }

    /// Starts a fresh attempt, or resumes the existing one when the backend
    /// reports a conflict. Repeated calls on an already-resolved session are
    /// no-ops; the backend is contacted at most once per session epoch.
    pub(crate) async fn initialize(&mut self, now: ClockReading) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Uninitialized {
            return Ok(());
        }

        let state = window::classify(now.now, self.exam.start_time, self.exam.end_time);
        if state != WindowState::Open {
            self.phase = SessionPhase::Failed;
            tracing::warn!(
                exam_id = self.exam.id,
                window = ?state,
                "Refusing to start an attempt outside the exam window"
            );
            return Err(SessionError::WindowViolation(state));
        }

        self.phase = SessionPhase::Resolving;
        let token = self.epoch;
        let outcome = resolve(&self.store, &self.auth, self.exam.id).await;
        self.finish_initialize(token, now, outcome)
    }

    /// Tears the session down while a resolution may still be in flight. Any
    /// response that lands afterwards carries a stale epoch and is dropped.
    pub(crate) fn abandon(&mut self) {
        self.epoch += 1;
        self.phase = SessionPhase::Uninitialized;
        self.attempt = None;
        self.questions.clear();
        self.answers.clear();
        self.cursor = 0;
        self.remaining_minutes = 0;
    }

    fn finish_initialize(
        &mut self,
        token: u64,
        now: ClockReading,
        outcome: Result<Resolution, BackendError>,
    ) -> Result<(), SessionError> {
        if token != self.epoch {
            metrics::counter!("examport_stale_responses_total").increment(1);
            tracing::debug!(exam_id = self.exam.id, "Discarding stale initialization response");
            return Ok(());
        }

        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(err) => {
                self.phase = SessionPhase::Failed;
                return Err(SessionError::Initialization(err));
            }
        };

        self.apply(resolution, now);
        Ok(())
    }

    fn apply(&mut self, resolution: Resolution, now: ClockReading) {
        let Resolution { exam, attempt, questions, answers, resumed } = resolution;

        let submitted = attempt.status() == AttemptStatus::Submitted;
        self.remaining_minutes = if submitted {
            0
        } else {
            let allowed = window::allowed_duration_minutes(
                attempt.start_time,
                exam.end_time,
                exam.duration_minutes,
            );
            let elapsed = minutes_between(attempt.start_time, now.now);
            (allowed - elapsed).clamp(0, allowed)
        };

        tracing::info!(
            exam_id = attempt.exam_id,
            attempt_id = attempt.id,
            student_id = attempt.student_id,
            resumed,
            submitted,
            remaining_minutes = self.remaining_minutes,
            authoritative_clock = now.authoritative,
            "Attempt session resolved"
        );

        self.exam = exam;
        self.attempt = Some(attempt);
        self.questions = questions;
        self.answers = answers;
        self.cursor = 0;
        self.phase = if submitted { SessionPhase::Submitted } else { SessionPhase::Active };
    }

    /// Sets or clears the locally buffered selection for one question.
    /// Answers never touch the network until submission; buffering locally
    /// keeps a flaky connection from losing selections mid-exam.
    pub(crate) fn select_answer(&mut self, question_id: i64, option: Option<i64>) {
        if self.phase != SessionPhase::Active {
            return;
        }
        if !self.questions.iter().any(|question| question.id == question_id) {
            return;
        }

        match option {
            Some(option_id) => {
                self.answers.insert(question_id, option_id);
            }
            None => {
                self.answers.remove(&question_id);
            }
        }
    }

    /// Moves the cursor if `index` addresses a question; out-of-range indexes
    /// are ignored. Navigation never touches the answer map.
    pub(crate) fn navigate_to(&mut self, index: usize) {
        if self.phase != SessionPhase::Active {
            return;
        }
        if index < self.questions.len() {
            self.cursor = index;
        }
    }

    pub(crate) fn next_question(&mut self) {
        self.navigate_to(self.cursor + 1);
    }

    pub(crate) fn previous_question(&mut self) {
        if self.cursor > 0 {
            self.navigate_to(self.cursor - 1);
        }
    }

    /// Sends the complete submission exactly once. Calls from any phase other
    /// than `Active` are silent no-ops, which is what keeps a manual click
    /// and a timer expiry racing each other down to a single network call.
    /// On failure the session returns to `Active` so the same call path can
    /// be retried, manually or by the expiry handler.
    pub(crate) async fn submit(
        &mut self,
        reason: SubmitReason,
    ) -> Result<Option<SubmitResponse>, SessionError> {
        if self.phase != SessionPhase::Active {
            tracing::debug!(
                exam_id = self.exam.id,
                phase = ?self.phase,
                reason = reason.as_str(),
                "Ignoring submit outside the active phase"
            );
            return Ok(None);
        }

        self.phase = SessionPhase::Submitting;
        let request = self.build_submission();
        metrics::counter!("examport_submissions_total", "reason" => reason.as_str()).increment(1);

        match self.store.submit_exam(&self.auth, self.exam.id, &request).await {
            Ok(response) => {
                self.attempt = Some(response.attempt.clone());
                self.phase = SessionPhase::Submitted;
                tracing::info!(
                    exam_id = self.exam.id,
                    reason = reason.as_str(),
                    answered = self.answers.len(),
                    questions = self.questions.len(),
                    total_score = response.attempt.total_score,
                    "Attempt submitted"
                );
                Ok(Some(response))
            }
            Err(err) => {
                self.phase = SessionPhase::Active;
                metrics::counter!("examport_submission_failures_total").increment(1);
                tracing::warn!(
                    exam_id = self.exam.id,
                    reason = reason.as_str(),
                    error = %err,
                    "Submission failed; the attempt stays active for retry"
                );
                Err(SessionError::Submission(err))
            }
        }
    }

    /// One entry per question in server order, with an explicit null for
    /// every unanswered question.
    pub(crate) fn build_submission(&self) -> SubmitRequest {
        SubmitRequest {
            answers: self
                .questions
                .iter()
                .map(|question| AnswerEntry {
                    question_id: question.id,
                    selected_option_id: self.answers.get(&question.id).copied(),
                })
                .collect(),
        }
    }
}

async fn resolve<S: AttemptStore>(
    store: &S,
    auth: &AuthSession,
    exam_id: i64,
) -> Result<Resolution, BackendError> {
    match store.start_exam(auth, exam_id).await {
        Ok(fresh) => Ok(Resolution {
            answers: saved_answers(&fresh.questions),
            exam: fresh.exam,
            attempt: fresh.attempt,
            questions: fresh.questions,
            resumed: false,
        }),
        Err(BackendError::AttemptExists) => {
            tracing::info!(exam_id, "Attempt already exists; fetching its current state");
            let existing = store.exam_details(auth, exam_id).await?;
            Ok(Resolution {
                answers: saved_answers(&existing.questions),
                exam: existing.exam,
                attempt: existing.attempt,
                questions: existing.questions,
                resumed: true,
            })
        }
        Err(err) => Err(err),
    }
}

fn saved_answers(questions: &[QuestionDto]) -> BTreeMap<i64, i64> {
    questions
        .iter()
        .filter_map(|question| question.selected_option_id.map(|option| (question.id, option)))
        .collect()
}
