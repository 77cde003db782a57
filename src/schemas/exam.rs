use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Option labels as printed on the paper. Up to four options per question;
/// `Ord` gives multi-answer selections their canonical ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionOption {
    pub label: OptionLabel,
    #[validate(length(min = 1, message = "option text must not be empty"))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Question {
    pub id: String,
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
    #[validate(length(min = 1, max = 4, message = "questions carry 1..4 options"))]
    pub options: Vec<QuestionOption>,
    #[validate(range(min = 0.0, message = "marks must be non-negative"))]
    pub marks: f64,
    #[serde(default)]
    #[serde(alias = "negativeMarks")]
    #[validate(range(min = 0.0, message = "negative_marks must be non-negative"))]
    pub negative_marks: f64,
    #[serde(default)]
    #[serde(alias = "multiCorrect")]
    pub multi_correct: bool,
    #[serde(default)]
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
}

/// Exam metadata plus the ordered question set, fetched once at session start
/// and read-only for the session's duration. Correct answers are never part of
/// this payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExamDefinition {
    pub id: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub duration_minutes: u32,
    #[serde(default)]
    pub premium: bool,
    pub questions: Vec<Question>,
}

impl ExamDefinition {
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn total_marks(&self) -> f64 {
        self.questions.iter().map(|question| question.marks).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_labels_order_ascending() {
        assert!(OptionLabel::A < OptionLabel::B);
        assert!(OptionLabel::C < OptionLabel::D);
    }

    #[test]
    fn exam_definition_deserializes_camel_case_aliases() {
        let exam: ExamDefinition = serde_json::from_value(serde_json::json!({
            "id": "exam-1",
            "title": "Algebra Mock",
            "durationMinutes": 10,
            "questions": [{
                "id": "q1",
                "prompt": "2 + 2 = ?",
                "options": [
                    {"label": "A", "text": "3"},
                    {"label": "B", "text": "4"}
                ],
                "marks": 4.0,
                "negativeMarks": 1.0,
                "multiCorrect": false
            }]
        }))
        .expect("exam json");

        assert_eq!(exam.duration_seconds(), 600);
        assert_eq!(exam.question_count(), 1);
        assert_eq!(exam.questions[0].negative_marks, 1.0);
        assert!(!exam.questions[0].multi_correct);
    }

    #[test]
    fn total_marks_sums_questions() {
        let exam: ExamDefinition = serde_json::from_value(serde_json::json!({
            "id": "exam-2",
            "title": "Mixed",
            "duration_minutes": 5,
            "questions": [
                {"id": "q1", "prompt": "a", "options": [{"label": "A", "text": "x"}], "marks": 4.0},
                {"id": "q2", "prompt": "b", "options": [{"label": "A", "text": "y"}], "marks": 2.0}
            ]
        }))
        .expect("exam json");

        assert_eq!(exam.total_marks(), 6.0);
    }
}
