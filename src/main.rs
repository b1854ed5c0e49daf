use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::db::pool::connect_to_db;
use infrastructure::media_server::MediaServer;
use infrastructure::pubsub::notifier::{Notifier, RedisNotifier};
use infrastructure::queue::rabbitmq::RabbitMqService;
use infrastructure::redis::client::RedisService;
use modules::content::repository::{ContentStore, PgContentStore};
use modules::content::service::ContentService;
use modules::presence::service::PresenceService;
use modules::presence::store::RedisPresenceStore;
use modules::stream::prober::ReadinessProber;
use modules::stream::service::LiveStreamService;
use workers::orphan_monitor::OrphanMonitor;
use workers::presence_sweep::PresenceSweep;
use workers::scheduler::run_periodic;
use workers::transcode_results::run_transcode_results;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting content lifecycle service...");

    let config = AppConfig::new().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let db = connect_to_db(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let redis = RedisService::new(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let media = MediaServer::new(config.media.clone(), http.clone())?;

    let content_store: Arc<dyn ContentStore> = Arc::new(PgContentStore::new(db));
    let notifier: Arc<dyn Notifier> =
        Arc::new(RedisNotifier::new(redis.clone(), &config.notification_channel));

    let content = ContentService::new(content_store.clone());
    let streams = LiveStreamService::new(
        content_store.clone(),
        media,
        ReadinessProber::new(http, config.probe.clone()),
        notifier,
    );
    let presence = PresenceService::new(
        Arc::new(RedisPresenceStore::new(redis)),
        content_store.clone(),
        config.presence.ttl,
    );

    let shutdown = CancellationToken::new();
    let mut workers = vec![
        tokio::spawn(run_periodic(
            Arc::new(OrphanMonitor::new(
                content_store.clone(),
                streams.clone(),
                config.orphan.clone(),
            )),
            config.orphan.interval,
            config.sweep_iteration_timeout,
            shutdown.clone(),
        )),
        tokio::spawn(run_periodic(
            Arc::new(PresenceSweep::new(presence.clone(), content_store.clone())),
            config.presence.sweep_interval,
            config.sweep_iteration_timeout,
            shutdown.clone(),
        )),
    ];

    match &config.rabbitmq_url {
        Some(url) => match RabbitMqService::new(url).await {
            Ok(queue) => workers.push(tokio::spawn(run_transcode_results(
                queue,
                content.clone(),
                config.transcode_results_queue.clone(),
                shutdown.clone(),
            ))),
            Err(e) => warn!("Transcode results consumer disabled: {:#}", e),
        },
        None => info!("RABBITMQ_URL not set, transcode results arrive over HTTP only"),
    }

    let app = app::create_app(state::AppState::new(content, streams, presence));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            error!("Background worker ended abnormally: {}", e);
        }
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining...");
    shutdown.cancel();
}
