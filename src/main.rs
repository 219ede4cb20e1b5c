use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use towerctl::{Subscribe, Tower, TowerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cfg = TowerConfig::from_env().context("loading tower configuration")?;

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(towerctl::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let tower = Tower::builder(cfg).with_subscribers(subs).build();
    tower.run().await?;
    tracing::info!("tower stopped");
    Ok(())
}
