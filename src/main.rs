#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use std::net::SocketAddr;
use std::sync::Arc;
use telereach_server::api::{MgmtState, ServiceContainer};
use telereach_server::config::Config;
use telereach_server::services::crypto_service::CryptoService;
use telereach_server::services::health_service::HealthService;
use telereach_server::services::key_service::KeyService;
use telereach_server::services::message_service::MessageService;
use telereach_server::services::notification::{DistributedNotificationService, NotificationService};
use telereach_server::services::relationship_service::RelationshipService;
use telereach_server::storage::key_repo::KeyRepository;
use telereach_server::storage::message_repo::MessageRepository;
use telereach_server::storage::pubsub::RedisClient;
use telereach_server::storage::relationship_repo::RelationshipRepository;
use telereach_server::storage::user_repo::UserRepository;
use telereach_server::{api, storage, telemetry};
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    telereach_server::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, background_tasks) = async {
        // Phase 1: infrastructure
        let pool = storage::init_pool(&config.database_url).await?;
        storage::run_migrations(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        telereach_server::spawn_signal_handler(shutdown_tx.clone());

        let pubsub = RedisClient::new(
            &config.pubsub,
            config.notifications.global_channel_capacity,
            shutdown_rx.clone(),
        )
        .await?;

        // Phase 2: services
        let crypto_service = CryptoService::new();
        let user_repo = UserRepository::new(pool.clone());
        let key_service =
            KeyService::new(KeyRepository::new(pool.clone()), user_repo.clone(), crypto_service);
        let relationship_service = RelationshipService::new(RelationshipRepository::new(pool.clone()));
        let (notification_service, background_tasks) =
            DistributedNotificationService::new(Arc::clone(&pubsub), &config, shutdown_rx.clone()).await?;
        let notification_service: Arc<dyn NotificationService> = Arc::new(notification_service);
        let message_service = MessageService::new(
            MessageRepository::new(pool.clone()),
            user_repo,
            relationship_service,
            Arc::clone(&notification_service),
            config.messaging.clone(),
        );
        let health_service = HealthService::new(pool, Arc::clone(&pubsub), config.health.clone());

        // Phase 3: listeners and routers
        let services = ServiceContainer {
            key_service,
            message_service,
            notification_service,
        };
        let app_router = api::app_router(config.clone(), services, shutdown_rx.clone());
        let mgmt_app = api::mgmt_router(MgmtState { health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<_, anyhow::Error>((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, background_tasks))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: serve until shutdown
    let mut api_rx = shutdown_tx.subscribe();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_tx.subscribe();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: bounded wait for background tasks, then flush and exit
    let _ = shutdown_tx.send(true);
    tokio::select! {
        _ = futures::future::join_all(background_tasks) => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
