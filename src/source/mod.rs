//! Desired state: the addresses the allocation store assigns to this host.
//!
//! A [`DesiredStateSource`] offers a point-in-time listing and a live change
//! stream, both scoped to the host key prefix. Ordering is guaranteed within a
//! single subscription only; a resubscribe may leave a gap that the full
//! resync loop closes.

mod etcd;
pub use etcd::*;


use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::Result;

/// Lazy, unbounded change stream of one subscription session.
///
/// The stream ends (`None`) when the session closes. An `Err` item reports a
/// transport or server-side termination and is the last item of the session.
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Key created or its value replaced; both mean "announce"
    Create,
    /// Key removed; means "withdraw"
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub key: String,
}

impl ChangeEvent {
    pub fn create(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Create,
            key: key.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: key.into(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DesiredStateSource: Send + Sync + 'static {
    /// Full snapshot of the raw keys below `host_prefix`.
    ///
    /// # Errors
    /// Returns [`crate::SourceError`] when the store cannot be read.
    async fn list(
        &self,
        host_prefix: &str,
    ) -> Result<Vec<String>>;

    /// Opens a change subscription below `host_prefix`.
    ///
    /// Implementations resume from their own cursor when they can; the caller
    /// simply subscribes again once the returned stream ends.
    ///
    /// # Errors
    /// Returns [`crate::SourceError`] when the subscription cannot be opened.
    async fn subscribe(
        &self,
        host_prefix: &str,
    ) -> Result<ChangeStream>;
}
