//! Cooperative shutdown.
//!
//! The driver checks a [`ShutdownListener`] between steps and awaits it at
//! every suspension point. A backend call in flight is never interrupted.

use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Sending side of the shutdown channel.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Ask every listener to stop. Repeated calls are harmless.
    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the shutdown channel.
///
/// Once every [`Shutdown`] handle is dropped the listener reports a request,
/// so an abandoned driver never waits forever.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        // Err means the sender is gone, which counts as a request.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

async fn next_signal(sigterm: &mut signal::unix::Signal) -> &'static str {
    tokio::select! {
        _ = signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

/// Translate SIGINT/SIGTERM into shutdown requests.
///
/// The first signal asks for a graceful stop. A later signal arriving after
/// `grace` has elapsed exits the process with code 1; one arriving earlier is
/// ignored.
pub fn spawn_signal_handler(shutdown: Shutdown, grace: Duration) -> std::io::Result<JoinHandle<()>> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = next_signal(&mut sigterm).await;
        info!("Received {}, trying to perform graceful stop", name);
        shutdown.request();
        let requested_at = Instant::now();

        loop {
            let name = next_signal(&mut sigterm).await;
            if requested_at.elapsed() >= grace {
                error!("Received {} after {:?}, exiting immediately", name, grace);
                std::process::exit(1);
            }
            warn!("Received {} during graceful stop, ignoring", name);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_reaches_all_listeners() {
        let shutdown = Shutdown::new();
        let a = shutdown.listener();
        let b = a.clone();
        assert!(!a.is_requested());

        shutdown.request();
        assert!(a.is_requested());
        assert!(b.is_requested());
        b.requested().await;
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_request() {
        let shutdown = Shutdown::new();
        let listener = shutdown.listener();
        drop(shutdown);

        assert!(listener.is_requested());
        listener.requested().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_requested_waits_for_request() {
        let shutdown = Shutdown::new();
        let listener = shutdown.listener();

        let waiter = tokio::spawn(async move { listener.requested().await });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        shutdown.request();
        waiter.await.unwrap();
    }
}
