//! Spook service host
//!
//! Boots a hub, registers the extra services, activates the repairs and
//! tears everything down again on ctrl-c.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use spook_core::config::{get_config_bool, load_environment};
use spook_core::{Hub, SpookConfig};
use spook_repairs::RepairManager;
use spook_services::{ServiceEnv, ServiceManager, ServiceRegistry};

#[derive(Parser, Debug)]
#[command(name = "spook-service")]
#[command(about = "Hub extension host: extra services and repair checks")]
struct Args {
    /// TOML config file (falls back to $SPOOK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print registered services and active repairs, then exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = load_environment();
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("spook_service=info".parse()?)
        .add_directive("spook_repairs=info".parse()?)
        .add_directive("spook_services=info".parse()?)
        .add_directive("spook_core=info".parse()?);
    if args.json_logs || get_config_bool("SPOOK_JSON_LOGS", false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Some(path) = env_file {
        info!("Loaded environment from {}", path);
    }

    let config = SpookConfig::load(args.config.as_deref())?;
    info!(
        "Inspect cooldown {}s, {} repairs and {} services disabled",
        config.inspect_cooldown_secs,
        config.disabled_repairs.len(),
        config.disabled_services.len()
    );

    let hub = Hub::new();

    let registry = Arc::new(ServiceRegistry::new(hub.clone()));
    let services = ServiceManager::new(registry.clone(), config.clone(), ServiceEnv::default());
    services.setup().await?;

    let repairs = RepairManager::new(hub.clone(), config);
    if let Err(e) = repairs.setup().await {
        warn!("Repair setup failed: {}", e);
        repairs.teardown().await;
        services.teardown().await;
        return Err(e.into());
    }

    if args.list {
        let active: Vec<String> = repairs.active().await.iter().map(|id| id.to_string()).collect();
        let listing = serde_json::json!({
            "services": registry.list().await,
            "repairs": active,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        info!("Spook is running");
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
    }

    hub.begin_stop();
    repairs.teardown().await;
    services.teardown().await;
    hub.mark_stopped();

    Ok(())
}
