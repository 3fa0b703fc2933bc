//! Process signal fan-out.
//!
//! `SignalManager` keeps async handlers per signal. `listen()` waits for a real
//! SIGINT/SIGTERM via `tokio::signal` and runs that signal's handlers;
//! `trigger()` delivers a signal directly (used by tests and embedders that
//! own their own signal plumbing).

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{info, warn};

use crate::exposition::PrometheusExporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Graceful interrupt (SIGINT / Ctrl+C).
    Interrupt,
    /// Graceful terminate (SIGTERM).
    Terminate,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
        }
    }
}

type Handler = Arc<dyn Fn(Signal) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
pub struct SignalManager {
    handlers: DashMap<Signal, Vec<Handler>>,
}

impl SignalManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&self, signal: Signal, handler: F)
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |s| handler(s).boxed());
        self.handlers.entry(signal).or_default().push(handler);
    }

    pub fn handler_count(&self, signal: Signal) -> usize {
        self.handlers.get(&signal).map(|h| h.len()).unwrap_or(0)
    }

    /// Run every handler registered for `signal`, in registration order.
    /// Returns how many ran.
    pub async fn trigger(&self, signal: Signal) -> usize {
        // Clone out so no shard lock is held across handler awaits.
        let handlers: Vec<Handler> = self
            .handlers
            .get(&signal)
            .map(|h| h.value().clone())
            .unwrap_or_default();

        info!(signal = signal.as_str(), handlers = handlers.len(), "signal received");
        for handler in &handlers {
            handler(signal).await;
        }
        handlers.len()
    }

    /// Wait for the first OS termination signal, run its handlers, return it.
    pub async fn listen(&self) -> Signal {
        let signal = wait_for_signal().await;
        self.trigger(signal).await;
        signal
    }
}

async fn wait_for_signal() -> Signal {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => Signal::Interrupt,
        _ = terminate => Signal::Terminate,
    }
}

/// On SIGINT and SIGTERM, stop the exporter's refresh loop (which performs
/// one final refresh). Repeated signals are harmless.
pub fn register_shutdown(exporter: Arc<PrometheusExporter>, signals: &SignalManager) {
    for signal in [Signal::Interrupt, Signal::Terminate] {
        let exporter = Arc::clone(&exporter);
        signals.register(signal, move |s| {
            let exporter = Arc::clone(&exporter);
            async move {
                info!(signal = s.as_str(), "stopping metrics refresh");
                exporter.stop_refresh().await;
            }
        });
    }
}
