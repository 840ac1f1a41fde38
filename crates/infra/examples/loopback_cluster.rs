//! Two cache nodes sharing one in-process deployment
//!
//! Run with `RUST_LOG=debug` to watch the invalidation flow:
//!
//! ```text
//! cargo run -p layercache-infra --example loopback_cluster
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use layercache_core::CacheCoordinator;
use layercache_domain::{BackendKind, CacheSettings};
use layercache_infra::{init_logging, service_span, CacheMonitor, LoopbackNetwork};
use serde_json::{json, Value};
use tracing::{info, Instrument};

const EVENTS: &str = "loop://events";

fn settings(node_id: &str) -> CacheSettings {
    let mut settings = CacheSettings {
        backend: BackendKind::Memory,
        remote_url: EVENTS.to_string(),
        node_id: node_id.to_string(),
        ..CacheSettings::default()
    };
    settings.stream.block_timeout = Duration::from_millis(100);
    settings
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&CacheSettings::default().logging)?;
    run().instrument(service_span()).await
}

async fn run() -> anyhow::Result<()> {
    let network = LoopbackNetwork::new();
    let monitor = Arc::new(CacheMonitor::new());

    let west = CacheCoordinator::builder(settings("west"), network.connector(EVENTS))
        .metrics(monitor.clone())
        .build()
        .await
        .context("building west")?;
    let east = CacheCoordinator::builder(settings("east"), network.connector(EVENTS))
        .metrics(monitor.clone())
        .build()
        .await
        .context("building east")?;
    west.start().await?;
    east.start().await?;

    let headline: Value = east
        .obtain_with("news:1", || async { Ok(json!({"title": "first draft"})) }, None)
        .await?;
    info!(%headline, "east cached the headline");

    west.update_with("news:1", &json!({"title": "final"}), |_| async { Ok(()) }).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let cached: Option<Value> = east.get("news:1").await?;
    info!(?cached, "east after west's update");

    west.health_check().await;
    monitor.log_stats();

    west.shutdown().await;
    east.shutdown().await;
    Ok(())
}
