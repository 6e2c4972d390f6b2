//! Cursor pagination for list operations.
//!
//! # Pivots on a moving list
//!
//! Storage listings are read while the queue keeps changing. When the pivot
//! item no longer exists, the service returns the nearest next item instead
//! of failing. Callers that care can check with [`begins_at_pivot`]; a
//! mismatch is expected and is never reported as an error by this crate.

use crate::ids::HasId;

/// Cursor for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Opaque resume token; empty starts from the beginning.
    pub pivot: String,
    /// Maximum number of items; zero or negative lets the server decide.
    pub limit: i32,
}

impl ListOptions {
    pub fn new(pivot: impl Into<String>, limit: i32) -> Self {
        Self {
            pivot: pivot.into(),
            limit,
        }
    }

    /// Start from the beginning with the given limit.
    pub fn with_limit(limit: i32) -> Self {
        Self::new(String::new(), limit)
    }

    pub fn starts_from_beginning(&self) -> bool {
        self.pivot.is_empty()
    }

    pub fn uses_server_limit(&self) -> bool {
        self.limit <= 0
    }

    /// `(pivot, limit)` as sent on the wire; `None` means all defaults.
    pub(crate) fn wire_fields(options: Option<&ListOptions>) -> (String, i32) {
        match options {
            Some(options) => (options.pivot.clone(), options.limit),
            None => (String::new(), 0),
        }
    }
}

/// Check whether a page starts with the item named by `pivot`.
///
/// Returns `true` for an empty pivot, since the page then starts at the
/// beginning by definition. An empty page never matches a non-empty pivot.
pub fn begins_at_pivot<I: HasId>(items: &[I], pivot: &str) -> bool {
    if pivot.is_empty() {
        return true;
    }
    items.first().is_some_and(|item| item.id() == pivot)
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
