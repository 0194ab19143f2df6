use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::schemas::exam::{ExamDto, QuestionDto};

/// Observable lifecycle of an attempt row. The transition is one-directional;
/// an attempt that reports `Submitted` never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptStatus {
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AttemptDto {
    pub(crate) id: i64,
    pub(crate) exam_id: i64,
    pub(crate) student_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) submitted_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub(crate) total_score: f64,
}

impl AttemptDto {
    pub(crate) fn status(&self) -> AttemptStatus {
        if self.submitted_at.is_some() {
            AttemptStatus::Submitted
        } else {
            AttemptStatus::InProgress
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartExamResponse {
    pub(crate) exam: ExamDto,
    pub(crate) attempt: AttemptDto,
    pub(crate) questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamDetailsResponse {
    pub(crate) exam: ExamDto,
    pub(crate) attempt: AttemptDto,
    pub(crate) questions: Vec<QuestionDto>,
}

/// One entry per question in the exam, always. An unanswered question is an
/// explicit `null`, never a missing entry.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnswerEntry {
    pub(crate) question_id: i64,
    pub(crate) selected_option_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmitRequest {
    pub(crate) answers: Vec<AnswerEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub(crate) message: String,
    pub(crate) attempt: AttemptDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultSummary {
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultStatistics {
    pub(crate) average_score: f64,
    pub(crate) average_percentage: f64,
    pub(crate) total_participants: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamResultResponse {
    pub(crate) exam: ExamDto,
    pub(crate) my_result: ResultSummary,
    pub(crate) statistics: ResultStatistics,
}
