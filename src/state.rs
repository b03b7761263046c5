//! Application state shared by the CLI commands and the pipelines.

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::bus::EventPublisher;
use crate::cache::VisibilityCache;
use crate::email::EmailSender;
use crate::repositories::NotificationStore;
use crate::services::Services;

/// Application state containing all shared ports and services.
///
/// Cloning is cheap; every member is an `Arc` or built from them.
#[derive(Clone)]
pub struct AppState {
    /// All business logic services
    pub services: Services,
    pub store: Arc<dyn NotificationStore>,
    pub cache: Arc<dyn VisibilityCache>,
    pub publisher: Arc<dyn EventPublisher>,
    pub blobs: Arc<dyn BlobStore>,
    pub email: Arc<dyn EmailSender>,
}

impl AppState {
    /// Creates a new AppState from the backend ports.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        cache: Arc<dyn VisibilityCache>,
        publisher: Arc<dyn EventPublisher>,
        blobs: Arc<dyn BlobStore>,
        email: Arc<dyn EmailSender>,
        send_topic: String,
    ) -> Self {
        let services = Services::new(
            store.clone(),
            cache.clone(),
            publisher.clone(),
            blobs.clone(),
            send_topic,
        );
        Self {
            services,
            store,
            cache,
            publisher,
            blobs,
            email,
        }
    }
}
