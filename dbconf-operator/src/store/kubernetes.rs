//! Kubernetes-backed desired-state store.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::{future, StreamExt};
use kube::api::{Api, ListParams, WatchEvent, WatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Event, EventStream, ResourceStore};
use crate::crd::DesiredState;
use crate::error::{Error, Result};
use crate::record::DesiredRecord;

/// Default server-side watch timeout in seconds.
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 290;

/// Lists and watches custom objects of kind `K`.
pub struct KubeStore<K> {
    api: Api<K>,
    watch_timeout: u32,
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    /// Watch `namespace`, or every namespace when `None`.
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        let api = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self {
            api,
            watch_timeout: DEFAULT_WATCH_TIMEOUT_SECS,
        }
    }

    /// Ask the API server to close each watch after `secs` seconds.
    pub fn with_watch_timeout(mut self, secs: u32) -> Self {
        self.watch_timeout = secs;
        self
    }
}

fn to_event<K: DesiredState>(item: std::result::Result<WatchEvent<K>, kube::Error>) -> Option<Event> {
    match item {
        Ok(WatchEvent::Added(obj)) => Some(Event::Added(obj.desired_record())),
        Ok(WatchEvent::Modified(obj)) => Some(Event::Modified(obj.desired_record())),
        Ok(WatchEvent::Deleted(obj)) => Some(Event::Deleted(obj.desired_record())),
        Ok(WatchEvent::Bookmark(_)) => None,
        Ok(WatchEvent::Error(status)) => Some(Event::Error(Error::Protocol(format!(
            "watch error {}: {}",
            status.code, status.message
        )))),
        Err(e) => Some(Event::Error(Error::Protocol(e.to_string()))),
    }
}

#[async_trait]
impl<K> ResourceStore for KubeStore<K>
where
    K: Resource<DynamicType = ()>
        + DesiredState
        + DeserializeOwned
        + Clone
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn list(&self) -> Result<Vec<DesiredRecord>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::BackendUnavailable(format!("listing {}: {}", K::plural(&()), e)))?;

        debug!(kind = %K::kind(&()), count = list.items.len(), "Listed custom objects");
        Ok(list.items.iter().map(DesiredState::desired_record).collect())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        // Version "0" replays current objects as Added before live changes.
        let params = WatchParams::default().timeout(self.watch_timeout);
        let stream = self.api.watch(&params, "0").await.map_err(|e| {
            Error::BackendUnavailable(format!("watching {}: {}", K::plural(&()), e))
        })?;

        Ok(stream
            .filter_map(|item| future::ready(to_event(item)))
            .boxed())
    }
}
