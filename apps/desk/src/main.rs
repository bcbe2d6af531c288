use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_cell::SupabaseIdentityProvider;
use shared_config::AppConfig;
use shared_database::SupabaseStore;
use workflow_cell::{Phase, Workflow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic desk");

    let config = AppConfig::from_env();
    let provider = Arc::new(SupabaseIdentityProvider::new(&config));
    let store = Arc::new(SupabaseStore::new(&config));
    let mut desk = Workflow::new(config, provider, store);

    if let Err(err) = desk.start().await {
        if let Phase::Failed(message) = &desk.state().phase {
            warn!("{}", message);
        }
        return Err(err).context("desk failed to start");
    }

    desk.wait_until_loaded().await;
    report(&desk);

    let mut following = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            changed = desk.next_update(), if following => {
                if changed {
                    report(&desk);
                } else {
                    warn!("Live updates stopped; waiting for shutdown");
                    following = false;
                }
            }
        }
    }

    desk.shutdown();
    Ok(())
}

fn report(desk: &Workflow) {
    info!(
        "{} patients ({} seen today), {} appointments on {}",
        desk.total_patients(),
        desk.seen_today_count(),
        desk.agenda().len(),
        desk.state().agenda_date
    );
    if let Some(notification) = desk.notification() {
        warn!("{:?}: {}", notification.kind, notification.message);
    }
}
