//! Shared fixtures for driver integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dbconf_operator::{
    create_audit_logger, DesiredRecord, Driver, DriverConfig, Error, Event, EventStream, Mode,
    ResourceStore, Result, SchemaRegistrar, Shutdown,
};
use dbconf_ops::MemoryOps;
use futures::{stream, StreamExt};

// =============================================================================
// Scripted resource store
// =============================================================================

#[derive(Default)]
struct StoreState {
    records: Mutex<Vec<DesiredRecord>>,
    batches: Mutex<VecDeque<Vec<Event>>>,
    unavailable: AtomicBool,
    close_when_drained: AtomicBool,
    list_calls: AtomicU32,
    subscribe_calls: AtomicU32,
}

/// Store whose list result and subscription contents are set by the test.
///
/// Each subscribe hands out the next scripted batch and closes after it.
/// Once the batches run out, subscriptions stay open without events, or
/// close immediately after [`close_when_drained`](Self::close_when_drained).
#[derive(Clone, Default)]
pub struct ScriptedStore {
    state: Arc<StoreState>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I: IntoIterator<Item = DesiredRecord>>(records: I) -> Self {
        let store = Self::new();
        store.set_records(records);
        store
    }

    pub fn set_records<I: IntoIterator<Item = DesiredRecord>>(&self, records: I) {
        *self.state.records.lock().unwrap() = records.into_iter().collect();
    }

    pub fn push_batch(&self, events: Vec<Event>) {
        self.state.batches.lock().unwrap().push_back(events);
    }

    pub fn close_when_drained(&self) {
        self.state.close_when_drained.store(true, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> u32 {
        self.state.list_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.state.subscribe_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(Error::BackendUnavailable("store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for ScriptedStore {
    async fn list(&self) -> Result<Vec<DesiredRecord>> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.state.records.lock().unwrap().clone())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        self.state.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let batch = self.state.batches.lock().unwrap().pop_front();
        Ok(match batch {
            Some(events) => stream::iter(events).boxed(),
            None if self.state.close_when_drained.load(Ordering::SeqCst) => {
                stream::empty().boxed()
            }
            None => stream::pending().boxed(),
        })
    }
}

// =============================================================================
// Registrar
// =============================================================================

/// Registrar that is either ready immediately or never.
pub struct FakeRegistrar {
    ready: bool,
}

impl FakeRegistrar {
    pub fn ready() -> Self {
        Self { ready: true }
    }

    pub fn never_ready() -> Self {
        Self { ready: false }
    }
}

#[async_trait]
impl SchemaRegistrar for FakeRegistrar {
    fn schema(&self) -> &str {
        "postgresqlconfigs.containerconf.de"
    }

    async fn ensure_registered(&self) -> Result<()> {
        Ok(())
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(self.ready)
    }
}

// =============================================================================
// Driver construction
// =============================================================================

pub type TestDriver = Driver<ScriptedStore, Arc<MemoryOps>, FakeRegistrar>;

pub fn poll_config(interval: Duration) -> DriverConfig {
    DriverConfig {
        mode: Mode::Poll { interval },
        ..Default::default()
    }
}

pub fn stream_config(resync: bool) -> DriverConfig {
    DriverConfig {
        mode: Mode::Stream,
        resync_on_subscribe: resync,
        resubscribe_delay: Duration::from_millis(500),
        ..Default::default()
    }
}

pub fn driver(
    store: &ScriptedStore,
    ops: &Arc<MemoryOps>,
    registrar: FakeRegistrar,
    config: DriverConfig,
    shutdown: &Shutdown,
) -> TestDriver {
    Driver::new(
        store.clone(),
        Arc::clone(ops),
        registrar,
        create_audit_logger("test"),
        config,
        shutdown.listener(),
    )
}

/// Poll `condition` until it holds, advancing time between checks.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..1000 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
