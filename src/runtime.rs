//! Runtime assembly: builds the configured backends and runs the pipelines.
//!
//! This is the composition root. Every port is selected from configuration
//! (production backend or in-memory backend) and wired into the shared
//! [`AppState`]; `serve` additionally spawns the intake, fan-out and
//! reconciler loops and runs them until a shutdown signal.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::blob::{BlobStore, MemoryBlobStore, S3BlobStore};
use crate::bus::{
    EventConsumer, EventPublisher, MemoryEventBus, RedisEventConsumer, RedisEventPublisher,
};
use crate::cache::{MemoryVisibilityCache, RedisVisibilityCache, VisibilityCache};
use crate::config::settings::{
    BlobBackend, BusBackend, CacheBackend, EmailProvider, Settings, StoreBackend,
};
use crate::db::establish_async_connection_pool;
use crate::email::{EmailSender, RecordingEmailSender, ZeptoEmailSender};
use crate::error::AppResult;
use crate::pipelines::{FanoutPipeline, IntakePipeline, Reconciler};
use crate::repositories::{MemoryNotificationStore, NotificationStore, PgNotificationStore};
use crate::state::AppState;

/// Fully assembled application: shared state plus the bus consumers the
/// pipelines drain.
pub struct Runtime {
    pub state: AppState,
    settings: Settings,
    intake_consumer: Arc<dyn EventConsumer>,
    send_consumer: Arc<dyn EventConsumer>,
}

impl Runtime {
    /// Builds every configured backend and wires the application state.
    pub async fn build(settings: Settings) -> AppResult<Self> {
        settings.validate()?;

        let store: Arc<dyn NotificationStore> = match settings.store.backend {
            StoreBackend::Postgres => {
                let pool = establish_async_connection_pool(&settings.store).await?;
                Arc::new(PgNotificationStore::new(pool))
            }
            StoreBackend::Memory => Arc::new(MemoryNotificationStore::new()),
        };

        let cache: Arc<dyn VisibilityCache> = match settings.cache.backend {
            CacheBackend::Redis => {
                Arc::new(RedisVisibilityCache::new(&settings.cache.redis).await?)
            }
            CacheBackend::Memory => Arc::new(MemoryVisibilityCache::new()),
        };

        let (publisher, intake_consumer, send_consumer) = build_bus(&settings).await?;

        let blobs: Arc<dyn BlobStore> = match settings.blob.backend {
            BlobBackend::S3 => Arc::new(S3BlobStore::new(&settings.blob.s3).await?),
            BlobBackend::Memory => Arc::new(MemoryBlobStore::new(settings.blob.s3.bucket.clone())),
        };

        let email: Arc<dyn EmailSender> = match settings.email.provider {
            EmailProvider::Zepto => Arc::new(ZeptoEmailSender::new(&settings.email)?),
            EmailProvider::Recording => Arc::new(RecordingEmailSender::new()),
        };

        let state = AppState::new(
            store,
            cache,
            publisher,
            blobs,
            email,
            settings.bus.send_topic.clone(),
        );

        Ok(Self {
            state,
            settings,
            intake_consumer,
            send_consumer,
        })
    }

    /// Spawns every pipeline and runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            intake_topic = %self.settings.bus.intake_topic,
            send_topic = %self.settings.bus.send_topic,
            "jobcast starting"
        );

        let token = CancellationToken::new();
        let mut handles = Vec::new();

        let intake = IntakePipeline::new(self.intake_consumer, self.state.store.clone());
        handles.push(tokio::spawn(intake.run(token.clone())));

        let fanout = FanoutPipeline::new(
            self.send_consumer,
            self.state.blobs.clone(),
            self.state.email.clone(),
        );
        handles.push(tokio::spawn(fanout.run(token.clone())));

        if self.settings.reconciler.enabled {
            let reconciler = Reconciler::new(
                self.state.services.approval.clone(),
                &self.settings.reconciler,
            );
            handles.push(tokio::spawn(reconciler.run(token.clone())));
        }

        shutdown_signal().await;

        token.cancel();
        for handle in handles {
            let _ = handle.await;
        }

        info!("jobcast shutdown complete");
        Ok(())
    }
}

async fn build_bus(
    settings: &Settings,
) -> AppResult<(
    Arc<dyn EventPublisher>,
    Arc<dyn EventConsumer>,
    Arc<dyn EventConsumer>,
)> {
    match settings.bus.backend {
        BusBackend::Redis => {
            let instance = consumer_instance_name();
            let publisher = RedisEventPublisher::new(&settings.bus.redis).await?;
            let intake = RedisEventConsumer::new(
                &settings.bus.redis,
                &settings.bus.intake_topic,
                &settings.bus.group,
                &instance,
            )
            .await?;
            let send = RedisEventConsumer::new(
                &settings.bus.redis,
                &settings.bus.send_topic,
                &settings.bus.group,
                &instance,
            )
            .await?;
            Ok((Arc::new(publisher), Arc::new(intake), Arc::new(send)))
        }
        BusBackend::Memory => {
            let bus = Arc::new(MemoryEventBus::new());
            let intake = bus.consumer(&settings.bus.intake_topic);
            let send = bus.consumer(&settings.bus.send_topic);
            Ok((bus, Arc::new(intake), Arc::new(send)))
        }
    }
}

/// Per-process consumer name within the group.
fn consumer_instance_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("jobcast-{}", &id[..8])
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
