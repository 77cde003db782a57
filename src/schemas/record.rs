use serde::Serialize;

/// Payload handed to the result recorder once a session completes with a
/// server-recorded score. Violation count rides along for audit.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub exam_id: String,
    pub student_id: String,
    pub score_percent: f64,
    pub obtained_marks: f64,
    pub total_marks: f64,
    pub time_taken_seconds: u64,
    pub question_count: usize,
    pub attempted_count: usize,
    pub violation_count: usize,
    pub finished_at: String,
}
