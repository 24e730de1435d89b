// Telemetry: tracing setup and live-channel statistics.
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{DeskError, Result};

/// Install the global tracing subscriber. `RUST_LOG` controls filtering,
/// defaulting to `info`.
pub fn init_telemetry() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| DeskError::Config(format!("telemetry init failed: {e}")))?;

    info!(target: "telemetry", "telemetry initialized");
    Ok(())
}

/// Counters for one live channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub events_received: u64,
    pub events_dropped: u64,
    pub reconnect_attempts: u64,
}

/// Collector shared between the channel driver and whoever reports.
#[derive(Clone, Default)]
pub struct ChannelMetrics {
    stats: Arc<RwLock<ChannelStats>>,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_event(&self) {
        self.stats.write().await.events_received += 1;
    }

    pub async fn record_dropped(&self) {
        self.stats.write().await.events_dropped += 1;
    }

    pub async fn record_reconnect(&self) {
        self.stats.write().await.reconnect_attempts += 1;
    }

    pub async fn get_stats(&self) -> ChannelStats {
        self.stats.read().await.clone()
    }

    /// Log the current counters.
    pub async fn print_stats(&self) {
        let stats = self.get_stats().await;
        info!("=== Live Channel ===");
        info!("Events received: {}", stats.events_received);
        info!("Events dropped: {}", stats.events_dropped);
        info!("Reconnect attempts: {}", stats.reconnect_attempts);
    }
}
