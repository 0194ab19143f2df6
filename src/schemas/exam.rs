use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CourseDto {
    pub(crate) code: String,
    pub(crate) name: String,
}

/// Exam as the backend publishes it. Schedule fields travel as RFC 3339
/// instants; the naive Istanbul form exists only at the human boundary.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExamDto {
    pub(crate) id: i64,
    pub(crate) course_id: i64,
    pub(crate) exam_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) end_time: OffsetDateTime,
    pub(crate) duration_minutes: i64,
    #[serde(default)]
    pub(crate) weight_percentage: f64,
    #[serde(default)]
    pub(crate) course: Option<CourseDto>,
}

/// Option order is server-assigned and preserved as received; the attempt UI
/// must never re-shuffle it between renders. Correctness flags are absent in
/// every student-facing payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnswerOptionDto {
    pub(crate) id: i64,
    pub(crate) question_id: i64,
    pub(crate) option_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QuestionDto {
    pub(crate) id: i64,
    pub(crate) question_text: String,
    pub(crate) question_type: String,
    pub(crate) points: f64,
    pub(crate) answer_options: Vec<AnswerOptionDto>,
    /// Present on the existing-attempt path when the backend already recorded
    /// a selection for this question.
    #[serde(default)]
    pub(crate) selected_option_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExamListingDto {
    #[serde(flatten)]
    pub(crate) exam: ExamDto,
    #[serde(default)]
    pub(crate) can_start: bool,
    #[serde(default)]
    pub(crate) already_taken: bool,
    #[serde(default)]
    pub(crate) in_progress: bool,
    #[serde(default)]
    pub(crate) is_upcoming: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ExamListResponse {
    #[serde(default)]
    pub(crate) exams: Vec<ExamListingDto>,
    #[serde(default)]
    pub(crate) upcoming_exams: Vec<ExamListingDto>,
}
