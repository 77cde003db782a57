use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schemas::exam::OptionLabel;

/// A user's answer to one question. Single-correct questions hold exactly one
/// label; multi-correct questions hold the canonical ascending combination
/// (the `BTreeSet` keeps it sorted no matter the toggle order). On the wire a
/// single answer is a bare label and a multi answer a sorted array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerSelection {
    Single(OptionLabel),
    Multi(BTreeSet<OptionLabel>),
}

impl AnswerSelection {
    pub fn labels(&self) -> Vec<OptionLabel> {
        match self {
            AnswerSelection::Single(label) => vec![*label],
            AnswerSelection::Multi(labels) => labels.iter().copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnswerSelection::Single(_) => false,
            AnswerSelection::Multi(labels) => labels.is_empty(),
        }
    }
}

/// Immutable answer map frozen at submission time, keyed by question id.
/// Only questions with a current selection appear.
pub type AnswerSnapshot = BTreeMap<String, AnswerSelection>;

/// The frozen payload for one scoring attempt. A retry after a failed attempt
/// re-sends this exact value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionJob {
    pub session_id: String,
    pub exam_id: String,
    pub answers: AnswerSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ScoreRequest<'a> {
    pub exam_id: &'a str,
    pub session_id: &'a str,
    pub answers: &'a AnswerSnapshot,
}

/// Per-question verdict from the scorer, including the revealed correct
/// answer (only ever seen after submission).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionVerdict {
    pub question_id: String,
    pub correct: bool,
    #[serde(default)]
    pub awarded_marks: f64,
    pub correct_answer: AnswerSelection,
}

/// Wire shape of the scoring endpoint's response.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreResponse {
    pub score_percent: f64,
    pub obtained_marks: f64,
    pub total_marks: f64,
    #[serde(default = "default_recorded")]
    pub recorded: bool,
    pub questions: Vec<QuestionVerdict>,
}

fn default_recorded() -> bool {
    true
}

impl ScoreResponse {
    pub fn into_outcome(self) -> ScoreOutcome {
        ScoreOutcome {
            recorded: self.recorded,
            result: ScoreResult {
                score_percent: self.score_percent,
                obtained_marks: self.obtained_marks,
                total_marks: self.total_marks,
                questions: self.questions,
            },
        }
    }
}

/// Authoritative score for one session, immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub score_percent: f64,
    pub obtained_marks: f64,
    pub total_marks: f64,
    pub questions: Vec<QuestionVerdict>,
}

/// A score plus whether the scorer also persisted the attempt. `recorded =
/// false` means the one-attempt policy rejected persistence: the user still
/// sees the score, flagged as not saved, and the result recorder is skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub result: ScoreResult,
    pub recorded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_answer_serializes_as_bare_label() {
        let value = serde_json::to_value(AnswerSelection::Single(OptionLabel::B)).expect("json");
        assert_eq!(value, serde_json::json!("B"));
    }

    #[test]
    fn multi_answer_serializes_sorted() {
        let labels = BTreeSet::from([OptionLabel::C, OptionLabel::A]);
        let value = serde_json::to_value(AnswerSelection::Multi(labels)).expect("json");
        assert_eq!(value, serde_json::json!(["A", "C"]));
    }

    #[test]
    fn answer_selection_round_trips_both_forms() {
        let single: AnswerSelection = serde_json::from_value(serde_json::json!("D")).expect("single");
        assert_eq!(single, AnswerSelection::Single(OptionLabel::D));

        let multi: AnswerSelection =
            serde_json::from_value(serde_json::json!(["B", "D"])).expect("multi");
        assert_eq!(multi, AnswerSelection::Multi(BTreeSet::from([OptionLabel::B, OptionLabel::D])));
    }

    #[test]
    fn score_response_defaults_recorded_true() {
        let response: ScoreResponse = serde_json::from_value(serde_json::json!({
            "score_percent": 60.0,
            "obtained_marks": 6.0,
            "total_marks": 10.0,
            "questions": []
        }))
        .expect("response json");

        let outcome = response.into_outcome();
        assert!(outcome.recorded);
        assert_eq!(outcome.result.score_percent, 60.0);
    }
}
