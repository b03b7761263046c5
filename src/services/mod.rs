//! Service layer: business logic over the store, cache, bus and blob ports.

pub mod approval;
pub mod dashboard;

pub use approval::{ApprovalOutcome, ApprovalService, AttachmentUpload};
pub use dashboard::{DashboardService, DashboardSnapshot};

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::bus::EventPublisher;
use crate::cache::VisibilityCache;
use crate::repositories::NotificationStore;

/// All business logic services, cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub approval: ApprovalService,
    pub dashboard: DashboardService,
}

impl Services {
    /// Creates all services from the shared ports.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        cache: Arc<dyn VisibilityCache>,
        publisher: Arc<dyn EventPublisher>,
        blobs: Arc<dyn BlobStore>,
        send_topic: String,
    ) -> Self {
        Self {
            approval: ApprovalService::new(
                store.clone(),
                cache.clone(),
                publisher,
                blobs,
                send_topic,
            ),
            dashboard: DashboardService::new(store, cache),
        }
    }
}
