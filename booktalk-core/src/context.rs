//! Active-book context tracking
//!
//! A pure reducer over the function results of each completed turn, deriving
//! which book, if any, currently frames the conversation. No I/O.
//!
//! Entry/exit rules:
//! - A successful content fetch sets the active book (last fetch wins).
//! - A search or recommendation arriving while a book was already active
//!   clears it - a new search implies the user is switching topics. The
//!   check uses the state from before this turn's results, not the state
//!   mid-loop, so results within one turn cannot make the context flicker.
//! - An explicit user exit clears it unconditionally.

use crate::function::FunctionResult;

/// Status notice shown after the user explicitly leaves book mode.
pub const EXITED_BOOK_MODE_NOTICE: &str = "Left book discussion mode.";

/// The book currently under discussion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBook {
    pub book_id: String,
    pub book_title: String,
}

/// Tracks the active discussion context across turns.
#[derive(Debug, Default)]
pub struct ContextTracker {
    active: Option<ActiveBook>,
    status: String,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one turn's function results.
    pub fn apply(&mut self, results: &[FunctionResult]) {
        if results.is_empty() {
            return;
        }

        // Topic-switch heuristic is judged against the pre-turn state
        let was_active = self.active.is_some();

        for result in results {
            match result {
                FunctionResult::ContentFetch {
                    status,
                    book_id,
                    book_title,
                } if status == "success" => {
                    tracing::debug!(book_id = %book_id, "entering book context");
                    self.active = Some(ActiveBook {
                        book_id: book_id.clone(),
                        book_title: book_title.clone(),
                    });
                }
                FunctionResult::Search { .. } | FunctionResult::Recommendation { .. }
                    if was_active =>
                {
                    tracing::debug!("search/recommendation while in book context, clearing");
                    self.active = None;
                }
                _ => {}
            }
        }
    }

    /// Explicit user exit, independent of any function result.
    pub fn exit(&mut self) {
        self.active = None;
        self.status = EXITED_BOOK_MODE_NOTICE.to_string();
    }

    /// The currently active book, if any
    pub fn active(&self) -> Option<&ActiveBook> {
        self.active.as_ref()
    }

    /// Last context-related status notice (empty when none)
    pub fn status(&self) -> &str {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{MatchedBook, RecommendedBook};

    fn fetch(book_id: &str, title: &str, status: &str) -> FunctionResult {
        FunctionResult::ContentFetch {
            status: status.to_string(),
            book_id: book_id.to_string(),
            book_title: title.to_string(),
        }
    }

    fn search() -> FunctionResult {
        FunctionResult::Search {
            books: vec![MatchedBook {
                book_id: "9".to_string(),
                book_title: "Dracula".to_string(),
                description: None,
            }],
        }
    }

    fn recommendation() -> FunctionResult {
        FunctionResult::Recommendation {
            summary: None,
            books: vec![RecommendedBook {
                book_id: "1".to_string(),
                book_title: "Heidi".to_string(),
                reason: None,
            }],
        }
    }

    #[test]
    fn test_successful_fetch_enters_context() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[fetch("12", "Peter Pan", "success")]);
        assert_eq!(tracker.active().unwrap().book_id, "12");
    }

    #[test]
    fn test_failed_fetch_does_not_enter_context() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[fetch("99", "Unknown", "not_found")]);
        assert!(tracker.active().is_none());
    }

    #[test]
    fn test_last_fetch_wins() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[
            fetch("12", "Peter Pan", "success"),
            fetch("13", "Heidi", "success"),
        ]);
        assert_eq!(tracker.active().unwrap().book_id, "13");
    }

    #[test]
    fn test_search_clears_active_context() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[fetch("12", "Peter Pan", "success")]);
        tracker.apply(&[search()]);
        assert!(tracker.active().is_none());
    }

    #[test]
    fn test_recommendation_clears_active_context() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[fetch("12", "Peter Pan", "success")]);
        tracker.apply(&[recommendation()]);
        assert!(tracker.active().is_none());
    }

    #[test]
    fn test_search_without_active_context_is_ignored() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[search()]);
        assert!(tracker.active().is_none());
    }

    #[test]
    fn test_switch_check_uses_pre_turn_state() {
        let mut tracker = ContextTracker::new();
        // Fetch then search within one turn: the search sees the pre-turn
        // state (no active book), so the freshly fetched context survives.
        tracker.apply(&[fetch("12", "Peter Pan", "success"), search()]);
        assert_eq!(tracker.active().unwrap().book_id, "12");
    }

    #[test]
    fn test_explicit_exit() {
        let mut tracker = ContextTracker::new();
        tracker.apply(&[fetch("12", "Peter Pan", "success")]);
        tracker.exit();
        assert!(tracker.active().is_none());
        assert_eq!(tracker.status(), EXITED_BOOK_MODE_NOTICE);
    }
}
