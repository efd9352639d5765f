//! Desired-state store clients.
//!
//! A store hands out the current set of desired records and, in stream mode,
//! a live sequence of change events. A subscription may end at any time
//! without an error; callers are expected to subscribe again.

pub mod kubernetes;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{Error, Result};
use crate::record::DesiredRecord;

pub use kubernetes::KubeStore;

/// A change to one desired-state record.
#[derive(Debug)]
pub enum Event {
    Added(DesiredRecord),
    Modified(DesiredRecord),
    Deleted(DesiredRecord),
    /// The transport reported an error or delivered an undecodable payload.
    Error(Error),
}

/// Lazy, possibly finite sequence of events from one subscription.
pub type EventStream = BoxStream<'static, Event>;

/// Source of desired-state records.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List every current desired-state record.
    async fn list(&self) -> Result<Vec<DesiredRecord>>;

    /// Open a new subscription.
    async fn subscribe(&self) -> Result<EventStream>;
}
