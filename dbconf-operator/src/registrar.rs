//! Schema registration for the desired-state kinds.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, PostParams};
use kube::{Client, CustomResourceExt};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::shutdown::ShutdownListener;

/// Default number of registration/readiness attempts.
pub const DEFAULT_BOOTSTRAP_ATTEMPTS: u32 = 10;

/// Default delay between attempts.
pub const DEFAULT_BOOTSTRAP_DELAY: Duration = Duration::from_millis(200);

/// Registers the schema of a desired-state kind with the store.
#[async_trait]
pub trait SchemaRegistrar: Send + Sync {
    /// Name of the schema, for logs.
    fn schema(&self) -> &str;

    /// Register the schema. Already registered is success.
    async fn ensure_registered(&self) -> Result<()>;

    /// Whether the store accepts objects of the registered kind.
    async fn is_ready(&self) -> Result<bool>;
}

/// Registers the CRD of kind `K`.
pub struct CrdRegistrar<K> {
    api: Api<CustomResourceDefinition>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: CustomResourceExt> CrdRegistrar<K> {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
            _kind: PhantomData,
        }
    }
}

/// Whether the API server reports the CRD as established.
pub fn is_established(crd: &CustomResourceDefinition) -> bool {
    crd.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Established" && c.status == "True")
        })
        .unwrap_or(false)
}

#[async_trait]
impl<K: CustomResourceExt> SchemaRegistrar for CrdRegistrar<K> {
    fn schema(&self) -> &str {
        K::crd_name()
    }

    async fn ensure_registered(&self) -> Result<()> {
        match self.api.create(&PostParams::default(), &K::crd()).await {
            Ok(_) => {
                info!(crd = %K::crd_name(), "Registered custom resource definition");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(crd = %K::crd_name(), "Custom resource definition already registered");
                Ok(())
            }
            Err(e) => Err(Error::BackendUnavailable(format!(
                "registering {}: {}",
                K::crd_name(),
                e
            ))),
        }
    }

    async fn is_ready(&self) -> Result<bool> {
        let crd = self.api.get_opt(K::crd_name()).await.map_err(|e| {
            Error::BackendUnavailable(format!("reading {}: {}", K::crd_name(), e))
        })?;
        Ok(crd.as_ref().map(is_established).unwrap_or(false))
    }
}

/// How bootstrap ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Registered and ready after this many attempts.
    Ready(u32),
    /// Shutdown was requested before the schema became ready.
    Cancelled,
}

/// Register the schema and wait until it is ready.
///
/// Registration and readiness share one budget of `attempts` tries,
/// `delay` apart. Failures inside the budget are logged; running out of
/// attempts is a [`Error::Bootstrap`].
pub async fn wait_until_ready<R: SchemaRegistrar + ?Sized>(
    registrar: &R,
    attempts: u32,
    delay: Duration,
    shutdown: &ShutdownListener,
) -> Result<Readiness> {
    let mut registered = false;

    for attempt in 1..=attempts {
        if shutdown.is_requested() {
            return Ok(Readiness::Cancelled);
        }

        if !registered {
            match registrar.ensure_registered().await {
                Ok(()) => registered = true,
                Err(e) => warn!(schema = %registrar.schema(), attempt, "Schema registration failed: {}", e),
            }
        }

        if registered {
            match registrar.is_ready().await {
                Ok(true) => {
                    info!(schema = %registrar.schema(), attempt, "Schema is ready");
                    return Ok(Readiness::Ready(attempt));
                }
                Ok(false) => debug!(schema = %registrar.schema(), attempt, "Schema not ready yet"),
                Err(e) => warn!(schema = %registrar.schema(), attempt, "Readiness check failed: {}", e),
            }
        }

        if attempt < attempts {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.requested() => return Ok(Readiness::Cancelled),
            }
        }
    }

    Err(Error::Bootstrap(format!(
        "{} not ready after {} attempts",
        registrar.schema(),
        attempts
    )))
}
