//! Request context
//!
//! Every store operation carries a request-scoped correlation id used for
//! log correlation across the facade, the backend and the RPC framing
//! that may wrap it. The id is never semantically load-bearing. The
//! context can also carry a deadline; deadlines are checked before
//! durable I/O is issued, and a write that has started always runs to
//! completion or failure.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request-scoped context passed to every store operation.
#[derive(Clone, Debug)]
pub struct ReqContext {
    /// Correlation id, e.g. the id assigned by the API frontend.
    pub req_id: String,
    /// Optional absolute deadline for the request.
    pub deadline: Option<Instant>,
}

impl ReqContext {
    pub fn new(req_id: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
            deadline: None,
        }
    }

    /// Context with a generated correlation id, for callers that have no
    /// frontend-assigned id.
    #[must_use]
    pub fn generated() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Attach a deadline relative to now.
    #[must_use]
    pub fn with_deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(Instant::now() + after);
        self
    }

    /// Whether the deadline has elapsed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with `DeadlineExceeded` if the deadline has elapsed.
    pub fn check_deadline(&self) -> Result<()> {
        if self.expired() {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_deadline_never_expires() {
        let ctx = ReqContext::new("req-1");
        assert!(!ctx.expired());
        assert!(ctx.check_deadline().is_ok());
    }

    #[test]
    fn test_elapsed_deadline() {
        let ctx = ReqContext::new("req-1").with_deadline(Duration::from_secs(0));
        assert!(ctx.expired());
        assert!(matches!(
            ctx.check_deadline(),
            Err(Error::DeadlineExceeded)
        ));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ReqContext::generated().req_id, ReqContext::generated().req_id);
    }
}
