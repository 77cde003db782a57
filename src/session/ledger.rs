use std::collections::{BTreeSet, HashMap};

use crate::schemas::exam::{ExamDefinition, OptionLabel};
use crate::schemas::score::{AnswerSelection, AnswerSnapshot};

/// Palette status of one question, derived from the ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    NotVisited,
    Visited,
    Answered,
    MarkedForReview,
    AnsweredAndMarked,
}

#[derive(Debug, Clone)]
struct Entry {
    question_id: String,
    multi_correct: bool,
    selection: Option<AnswerSelection>,
    attempted: bool,
    marked: bool,
    visited: bool,
}

/// In-memory record of the user's answers and review flags for one session.
/// Pure state container: no operation fails. Question ids are fixed at
/// construction from the fetched question set; passing an id outside that set
/// is a programming error and panics.
#[derive(Debug)]
pub struct AnswerLedger {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl AnswerLedger {
    pub fn new(exam: &ExamDefinition) -> Self {
        let entries: Vec<Entry> = exam
            .questions
            .iter()
            .map(|question| Entry {
                question_id: question.id.clone(),
                multi_correct: question.multi_correct,
                selection: None,
                attempted: false,
                marked: false,
                visited: false,
            })
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.question_id.clone(), position))
            .collect();
        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, question_id: &str) -> &Entry {
        let position = *self
            .index
            .get(question_id)
            .unwrap_or_else(|| panic!("question id {question_id} outside the fetched question set"));
        &self.entries[position]
    }

    fn entry_mut(&mut self, question_id: &str) -> &mut Entry {
        let position = *self
            .index
            .get(question_id)
            .unwrap_or_else(|| panic!("question id {question_id} outside the fetched question set"));
        &mut self.entries[position]
    }

    /// Applies one option pick. Single-correct questions replace any prior
    /// selection; multi-correct questions toggle the label inside a sorted
    /// set. `attempted` becomes true on the first pick and never reverts.
    pub fn select(&mut self, question_id: &str, label: OptionLabel) {
        let entry = self.entry_mut(question_id);
        if entry.multi_correct {
            let mut labels = match entry.selection.take() {
                Some(AnswerSelection::Multi(labels)) => labels,
                _ => BTreeSet::new(),
            };
            if !labels.remove(&label) {
                labels.insert(label);
            }
            entry.selection =
                if labels.is_empty() { None } else { Some(AnswerSelection::Multi(labels)) };
        } else {
            entry.selection = Some(AnswerSelection::Single(label));
        }
        entry.attempted = true;
    }

    /// Drops the current selection. The question stays attempted.
    pub fn clear(&mut self, question_id: &str) {
        self.entry_mut(question_id).selection = None;
    }

    /// Flips the review flag and returns the new value. Independent of
    /// attempted and selection.
    pub fn toggle_marked(&mut self, question_id: &str) -> bool {
        let entry = self.entry_mut(question_id);
        entry.marked = !entry.marked;
        entry.marked
    }

    pub fn record_visit(&mut self, question_id: &str) {
        self.entry_mut(question_id).visited = true;
    }

    pub fn attempted_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.attempted).count()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|entry| entry.attempted)
    }

    /// Questions neither attempted nor flagged for review; the count shown
    /// in the submit confirmation dialog.
    pub fn unanswered_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.attempted && !entry.marked).count()
    }

    /// Questions flagged for review that were never attempted.
    pub fn marked_unanswered_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.attempted && entry.marked).count()
    }

    pub fn status(&self, question_id: &str) -> QuestionStatus {
        let entry = self.entry(question_id);
        match (entry.selection.is_some(), entry.marked) {
            (true, true) => QuestionStatus::AnsweredAndMarked,
            (true, false) => QuestionStatus::Answered,
            (false, true) => QuestionStatus::MarkedForReview,
            (false, false) if entry.visited => QuestionStatus::Visited,
            _ => QuestionStatus::NotVisited,
        }
    }

    /// Immutable copy of the current selections, keyed by question id.
    /// Questions without a selection are absent.
    pub fn snapshot(&self) -> AnswerSnapshot {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .selection
                    .as_ref()
                    .map(|selection| (entry.question_id.clone(), selection.clone()))
            })
            .collect()
    }
}
