#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prismetrics_core::{MetricsRegistry, Taxonomy, Unit};
use prismetrics_exporter::exposition::{ExporterOptions, PrometheusExporter};
use prismetrics_exporter::refresh::{register_shutdown, RefreshOptions, Signal, SignalManager};

fn exporter() -> Arc<PrometheusExporter> {
    let registry = Arc::new(MetricsRegistry::new(Taxonomy::empty().with_metric("x", Unit::Count)));
    registry.counter("x").unwrap().inc();
    Arc::new(PrometheusExporter::new(registry, ExporterOptions::default()).unwrap())
}

#[tokio::test(start_paused = true)]
async fn interrupt_stops_refresh_with_final_refresh() {
    let exp = exporter();
    exp.start_refresh(RefreshOptions::every(Duration::from_secs(60)));
    assert!(exp.get_stats().is_refreshing);

    let signals = SignalManager::new();
    register_shutdown(Arc::clone(&exp), &signals);
    assert_eq!(signals.handler_count(Signal::Interrupt), 1);
    assert_eq!(signals.handler_count(Signal::Terminate), 1);

    assert_eq!(signals.trigger(Signal::Interrupt).await, 1);
    let stats = exp.get_stats();
    assert!(!stats.is_refreshing);
    assert_eq!(stats.refresh_count, 1);
    assert!(exp.get_metrics().unwrap().contains("prismetrics_app_x 1\n"));

    // A later SIGTERM finds nothing to stop.
    signals.trigger(Signal::Terminate).await;
    assert_eq!(exp.get_stats().refresh_count, 1);
}

#[tokio::test]
async fn stop_without_start_is_harmless() {
    let exp = exporter();
    exp.stop_refresh().await;
    let stats = exp.get_stats();
    assert!(!stats.is_refreshing);
    assert_eq!(stats.refresh_count, 0);
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let signals = SignalManager::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let order = Arc::clone(&order);
        signals.register(Signal::Terminate, move |s| {
            let order = Arc::clone(&order);
            async move {
                assert_eq!(s, Signal::Terminate);
                order.lock().unwrap().push(i);
            }
        });
    }

    assert_eq!(signals.trigger(Signal::Terminate).await, 3);
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(signals.trigger(Signal::Interrupt).await, 0);
}

#[tokio::test]
async fn handlers_fire_on_every_trigger() {
    let signals = SignalManager::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    signals.register(Signal::Interrupt, move |_| {
        let h = Arc::clone(&h);
        async move {
            h.fetch_add(1, Ordering::SeqCst);
        }
    });

    signals.trigger(Signal::Interrupt).await;
    signals.trigger(Signal::Interrupt).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(Signal::Interrupt.as_str(), "SIGINT");
    assert_eq!(Signal::Terminate.as_str(), "SIGTERM");
}

#[tokio::test]
async fn start_during_stop_reports_refreshing() {
    let exp = exporter();
    exp.start_refresh(RefreshOptions::every(Duration::from_secs(60)));

    let stopping = {
        let exp = Arc::clone(&exp);
        tokio::spawn(async move { exp.stop_refresh().await })
    };
    while exp.get_stats().is_refreshing {
        tokio::task::yield_now().await;
    }

    // The old loop is gone but its final refresh may still be running.
    exp.start_refresh(RefreshOptions::every(Duration::from_secs(60)));
    stopping.await.unwrap();
    assert!(exp.get_stats().is_refreshing);

    exp.stop_refresh().await;
    assert!(!exp.get_stats().is_refreshing);
}
