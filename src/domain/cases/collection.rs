//! Ordered case collection with a single selection.
//!
//! Ordering rules:
//! - `replace_all` keeps exactly the given order
//! - `upsert` replaces an existing entry in place, or prepends an unseen one
//!
//! Selection rules:
//! - once any case exists a selection exists
//! - `replace_all` drops a selection the new listing no longer contains
//! - unrelated updates never clear the selection

use super::CaseSummary;
use crate::domain::foundation::CaseId;

/// Ordered sequence of case summaries, unique by case id, plus the selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseCollection {
    cases: Vec<CaseSummary>,
    selected: Option<CaseId>,
}

/// Outcome of an upsert, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An unseen case was inserted at the front.
    Inserted,
    /// An existing case was replaced at the given position.
    Replaced { position: usize },
}

impl CaseCollection {
    /// Creates an empty collection with no selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection, preserving the given order.
    ///
    /// Duplicate ids in the input keep their first occurrence so the
    /// uniqueness invariant holds even for a misbehaving server. A selection
    /// still present in the new listing is kept; otherwise the first entry is
    /// selected, or nothing when the listing is empty.
    pub fn replace_all(&mut self, summaries: Vec<CaseSummary>) {
        let mut cases: Vec<CaseSummary> = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if !cases.iter().any(|c| c.case_id == summary.case_id) {
                cases.push(summary);
            }
        }
        self.cases = cases;

        let still_listed = match &self.selected {
            Some(id) => self.cases.iter().any(|c| &c.case_id == id),
            None => false,
        };
        if !still_listed {
            self.selected = self.cases.first().map(|c| c.case_id.clone());
        }
    }

    /// Updates an existing case in place, or inserts an unseen one at the front.
    ///
    /// Selects the incoming case when nothing is selected yet.
    pub fn upsert(&mut self, summary: CaseSummary) -> UpsertOutcome {
        if self.selected.is_none() {
            self.selected = Some(summary.case_id.clone());
        }

        match self.position(&summary.case_id) {
            Some(position) => {
                self.cases[position] = summary;
                UpsertOutcome::Replaced { position }
            }
            None => {
                self.cases.insert(0, summary);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Sets the selection unconditionally.
    pub fn select(&mut self, case_id: CaseId) {
        self.selected = Some(case_id);
    }

    /// Empties the collection and the selection.
    pub fn clear(&mut self) {
        self.cases.clear();
        self.selected = None;
    }

    /// Cases in display order.
    pub fn cases(&self) -> &[CaseSummary] {
        &self.cases
    }

    /// Currently selected case id, if any.
    pub fn selected(&self) -> Option<&CaseId> {
        self.selected.as_ref()
    }

    /// Summary of the selected case, if it is present in the collection.
    pub fn selected_case(&self) -> Option<&CaseSummary> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    /// Looks up a case by id.
    pub fn get(&self, case_id: &CaseId) -> Option<&CaseSummary> {
        self.cases.iter().find(|c| &c.case_id == case_id)
    }

    /// Position of a case in display order.
    pub fn position(&self, case_id: &CaseId) -> Option<usize> {
        self.cases.iter().position(|c| &c.case_id == case_id)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
