//! DNS proxy orchestration.
//!
//! Builds the dispatcher, serves every listen address and runs the
//! background cache janitor and stats reporter.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{ALL_INTERFACES, Config};
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::transport::UdpTransport;

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Run the proxy until every listener has stopped.
///
/// Configuration errors are returned before anything is bound. Bind and
/// listener failures only affect their own address.
pub async fn run(config: Config) -> Result<(), ConfigError> {
    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);

    let mut listen = config.listen.clone();
    if listen.is_empty() {
        warn!(addr = ALL_INTERFACES, "no listen address configured, using default");
        listen.push(ALL_INTERFACES.to_string());
    }

    let listeners: Vec<JoinHandle<()>> = listen
        .into_iter()
        .map(|addr| tokio::spawn(listen_on(addr, Arc::clone(&dispatcher))))
        .collect();

    let janitor = spawn_janitor(Arc::clone(&dispatcher), config.cache.cleanup_interval());
    let reporter = spawn_reporter(Arc::clone(&dispatcher));

    for result in join_all(listeners).await {
        if let Err(e) = result {
            error!(error = %e, "listener task panicked");
        }
    }

    janitor.abort();
    reporter.abort();
    info!("all listeners stopped");
    Ok(())
}

async fn listen_on(addr: String, dispatcher: Arc<Dispatcher>) {
    let transport = match UdpTransport::bind(addr.as_str()).await {
        Ok(transport) => transport,
        Err(e) => {
            error!(addr = %addr, error = %e, "failed to bind");
            return;
        }
    };

    if let Err(e) = transport.serve(dispatcher).await {
        error!(addr = %addr, error = %e, "listener stopped");
    }
}

fn spawn_janitor(dispatcher: Arc<Dispatcher>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // first tick is immediate
        loop {
            interval.tick().await;
            let purged = dispatcher.cache().purge_expired();
            if purged > 0 {
                info!(purged, remaining = dispatcher.cache().len(), "cache cleanup");
            }
        }
    })
}

fn spawn_reporter(dispatcher: Arc<Dispatcher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REPORT_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = dispatcher.stats().snapshot();
            info!(
                queries = stats.queries,
                cache_hits = stats.cache_hits,
                hit_ratio = stats.hit_ratio(),
                forwarded = stats.forwarded,
                failures = stats.failures,
                avg_upstream_ms = stats.avg_upstream_ms,
                cache_size = dispatcher.cache().len(),
                "stats"
            );
        }
    })
}
