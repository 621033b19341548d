//! Paged list results
//!
//! Both backends expose list operations as a sequence of pages behind an
//! opaque continuation token: the cloud backend forwards its native
//! token, the embedded backend synthesizes one from the last key it
//! returned. The exhaustive list methods on the facade drain the pages
//! internally, so a page boundary is only visible to callers that ask
//! for an explicit limit.

use serde::{Deserialize, Serialize};

/// One page of a list result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListPage<T> {
    /// Items in this page, in key order.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

impl<T> ListPage<T> {
    /// Empty terminal page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_token: None,
        }
    }

    /// Whether this is the final page.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

impl<T> Default for ListPage<T> {
    fn default() -> Self {
        Self::empty()
    }
}
