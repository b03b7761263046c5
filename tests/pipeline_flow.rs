//! End-to-end flow tests over the in-memory backends.
//!
//! These drive the same pipeline code the `serve` command spawns, but pull
//! deliveries synchronously instead of running the loops, so every ack
//! decision is observable through the bus counters.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use jobcast::blob::{BlobStore, MemoryBlobStore};
use jobcast::bus::{EventConsumer, EventPublisher, MemoryEventBus, MemoryEventConsumer};
use jobcast::cache::MemoryVisibilityCache;
use jobcast::config::settings::ReconcilerConfig;
use jobcast::email::RecordingEmailSender;
use jobcast::error::AppError;
use jobcast::models::{NotificationStatus, TransitionChangeset};
use jobcast::pipelines::{FanoutPipeline, IntakePipeline, Reconciler};
use jobcast::repositories::{MemoryNotificationStore, NotificationStore};
use jobcast::services::{ApprovalService, AttachmentUpload, DashboardService};

const INTAKE_TOPIC: &str = "job.notification.pending";
const SEND_TOPIC: &str = "job.notification.send";

struct Harness {
    store: Arc<MemoryNotificationStore>,
    bus: Arc<MemoryEventBus>,
    blobs: Arc<MemoryBlobStore>,
    email: Arc<RecordingEmailSender>,
    intake: IntakePipeline,
    intake_consumer: Arc<MemoryEventConsumer>,
    fanout: FanoutPipeline,
    send_consumer: Arc<MemoryEventConsumer>,
    approval: ApprovalService,
    dashboard: DashboardService,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryNotificationStore::new());
        let cache = Arc::new(MemoryVisibilityCache::new());
        let bus = Arc::new(MemoryEventBus::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let email = Arc::new(RecordingEmailSender::new());

        let intake_consumer = Arc::new(bus.consumer(INTAKE_TOPIC));
        let send_consumer = Arc::new(bus.consumer(SEND_TOPIC));

        let intake = IntakePipeline::new(intake_consumer.clone(), store.clone());
        let fanout = FanoutPipeline::new(send_consumer.clone(), blobs.clone(), email.clone());
        let approval = ApprovalService::new(
            store.clone(),
            cache.clone(),
            bus.clone(),
            blobs.clone(),
            SEND_TOPIC.to_string(),
        );
        let dashboard = DashboardService::new(store.clone(), cache.clone());

        Self {
            store,
            bus,
            blobs,
            email,
            intake,
            intake_consumer,
            fanout,
            send_consumer,
            approval,
            dashboard,
        }
    }

    async fn publish_pending(&self, payload: &[u8]) {
        self.bus
            .publish(INTAKE_TOPIC, "k", payload)
            .await
            .expect("publish");
    }

    async fn drain_intake(&self) {
        while let Some(delivery) = self.intake_consumer.next().await.expect("next") {
            self.intake.handle_delivery(&delivery).await;
        }
    }

    async fn drain_fanout(&self) {
        while let Some(delivery) = self.send_consumer.next().await.expect("next") {
            self.fanout.handle_delivery(&delivery).await;
        }
    }

    /// Publishes and stores one pending notification.
    async fn ingest(&self, job_id: i64, deadline: DateTime<Utc>) {
        self.publish_pending(&pending_event(job_id, deadline)).await;
        self.drain_intake().await;
    }
}

fn pending_event(job_id: i64, deadline: DateTime<Utc>) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "jobId": job_id,
        "companyName": "Acme",
        "criteria": {"minCgpa": 7.5},
        "eligibleStudents": [
            {"student_id": "S1", "full_name": "Asha Rao", "email": "asha@example.edu"},
            {"student_id": "S2", "full_name": "Vikram Iyer", "email": "vikram@example.edu"}
        ],
        "eligibleCount": 2,
        "applicationDeadline": deadline.to_rfc3339(),
    }))
    .expect("encode")
}

fn in_two_days() -> DateTime<Utc> {
    Utc::now() + Duration::days(2)
}

#[tokio::test]
async fn replayed_pending_events_store_one_record() {
    let h = Harness::new();
    let payload = pending_event(101, in_two_days());

    for _ in 0..3 {
        h.publish_pending(&payload).await;
    }
    h.drain_intake().await;

    let record = h.store.find_by_job_id(101).await.unwrap().unwrap();
    assert_eq!(record.status, NotificationStatus::PendingApproval);
    assert_eq!(record.eligible_count, 2);

    assert_eq!(h.store.list_summaries().await.unwrap().len(), 1);
    // All three deliveries were acked.
    assert_eq!(h.bus.queued_len(INTAKE_TOPIC).await, 0);
    assert_eq!(h.bus.pending_len(INTAKE_TOPIC).await, 0);
}

#[tokio::test]
async fn malformed_events_are_acked_and_dropped() {
    let h = Harness::new();

    h.publish_pending(b"{not json").await;
    h.publish_pending(b"").await;
    // Valid shape, invalid content.
    let mut bad = serde_json::from_slice::<serde_json::Value>(&pending_event(7, in_two_days()))
        .unwrap();
    bad["jobId"] = json!(-3);
    h.publish_pending(&serde_json::to_vec(&bad).unwrap()).await;
    h.publish_pending(&pending_event(101, in_two_days())).await;

    h.drain_intake().await;

    assert_eq!(h.store.list_summaries().await.unwrap().len(), 1);
    assert!(h.store.find_by_job_id(101).await.unwrap().is_some());
    assert_eq!(h.bus.pending_len(INTAKE_TOPIC).await, 0);
}

#[tokio::test]
async fn approve_fans_out_one_email_per_student() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    let attachment = AttachmentUpload {
        file_name: "jd.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4 stub".to_vec(),
    };

    let outcome = h
        .approval
        .approve(101, "Apply before the deadline!", vec![attachment])
        .await
        .unwrap();
    assert_eq!(outcome.emails_enqueued, 2);
    assert_eq!(outcome.attachments_uploaded, 1);

    // Fan-out fully enqueued, so the record advanced past APPROVED.
    let approved = outcome.notification;
    assert_eq!(approved.status, NotificationStatus::Sent);
    assert!(approved.approved_at.is_some());
    assert_eq!(
        approved.admin_message.as_deref(),
        Some("Apply before the deadline!")
    );

    // Every referenced blob exists.
    let message_path = approved.admin_message_text_file.as_deref().unwrap();
    assert!(h.blobs.stat(message_path).await.is_ok());
    let attachment_paths = approved.attachments.as_ref().unwrap();
    assert_eq!(attachment_paths.0.len(), 1);
    assert!(h.blobs.stat(&attachment_paths.0[0]).await.is_ok());

    assert_eq!(h.bus.queued_len(SEND_TOPIC).await, 2);
    h.drain_fanout().await;

    let sent = h.email.sent();
    assert_eq!(sent.len(), 2);
    let mut recipients: Vec<&str> = sent.iter().map(|e| e.to.as_str()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["asha@example.edu", "vikram@example.edu"]);

    for mail in &sent {
        assert_eq!(mail.subject, "Placement Opportunity — Acme");
        assert_eq!(mail.body, "Apply before the deadline!");
        assert_eq!(mail.attachments.len(), 1);
        assert_eq!(mail.attachments[0].file_name, "jd.pdf");
        assert_eq!(mail.attachments[0].content_type, "application/pdf");
    }

    assert_eq!(h.bus.pending_len(SEND_TOPIC).await, 0);
}

#[tokio::test]
async fn concurrent_decisions_have_exactly_one_winner() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    let approve = h.approval.approve(101, "yes", Vec::new());
    let reject = h.approval.reject(101, "no");
    let (approve_result, reject_result) = tokio::join!(approve, reject);

    let winners = [approve_result.is_ok(), reject_result.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1);

    let record = h.store.find_by_job_id(101).await.unwrap().unwrap();
    assert!(record.status.is_terminal() || record.status == NotificationStatus::Approved);
    assert_ne!(record.status, NotificationStatus::PendingApproval);
}

#[tokio::test]
async fn terminal_states_reject_further_decisions() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    h.approval.reject(101, "criteria mismatch").await.unwrap();

    let err = h.approval.approve(101, "", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { ref reason } if reason == "Rejected job cannot be approved."));

    let err = h.approval.reject(101, "").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { ref reason } if reason == "Job is already rejected."));

    let record = h.store.find_by_job_id(101).await.unwrap().unwrap();
    assert_eq!(record.status, NotificationStatus::Rejected);
    assert!(record.rejected_at.is_some());

    // Nothing was fanned out.
    assert_eq!(h.bus.queued_len(SEND_TOPIC).await, 0);
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn approving_twice_is_a_conflict() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    h.approval.approve(101, "go", Vec::new()).await.unwrap();
    let err = h.approval.approve(101, "again", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { ref reason } if reason == "Job is already approved."));
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let h = Harness::new();
    let err = h.approval.approve(999, "", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn dashboard_shows_jobs_until_their_deadline() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;
    h.ingest(102, Utc::now() - Duration::hours(1)).await;

    h.approval.approve(101, "open", Vec::new()).await.unwrap();
    h.approval.approve(102, "late", Vec::new()).await.unwrap();

    let snapshot = h.dashboard.snapshot("S1").await.unwrap();
    assert_eq!(snapshot.active_job_ids, vec![101]);
    assert_eq!(snapshot.jobs.len(), 1);
    assert_eq!(snapshot.jobs[0].job_id, 101);
    assert_eq!(snapshot.jobs[0].company_name, "Acme");

    // Expiry is permanent: the pruned pair never comes back.
    let again = h.dashboard.snapshot("S1").await.unwrap();
    assert_eq!(again.active_job_ids, vec![101]);

    let unknown = h.dashboard.snapshot("nobody").await.unwrap();
    assert!(unknown.active_job_ids.is_empty());
    assert!(unknown.jobs.is_empty());
}

#[tokio::test]
async fn fanout_retries_only_the_failed_recipient() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    h.email.fail_for("vikram@example.edu");
    h.approval.approve(101, "come work here", Vec::new()).await.unwrap();

    h.drain_fanout().await;
    assert_eq!(h.email.sent().len(), 1);
    assert_eq!(h.email.sent()[0].to, "asha@example.edu");
    // The failed delivery stays unacked.
    assert_eq!(h.bus.pending_len(SEND_TOPIC).await, 1);

    h.email.recover("vikram@example.edu");
    assert_eq!(h.bus.redeliver_unacked(SEND_TOPIC).await, 1);
    h.drain_fanout().await;

    let sent = h.email.sent();
    assert_eq!(sent.len(), 2);
    // The already-delivered student was not emailed again.
    assert_eq!(
        sent.iter().filter(|e| e.to == "asha@example.edu").count(),
        1
    );
    assert_eq!(h.bus.pending_len(SEND_TOPIC).await, 0);
}

#[tokio::test]
async fn missing_body_blob_is_terminal_for_the_event() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    let outcome = h.approval.approve(101, "details inside", Vec::new()).await.unwrap();
    let body_path = outcome.notification.admin_message_text_file.unwrap();
    h.blobs.remove(&body_path);

    h.drain_fanout().await;

    assert!(h.email.sent().is_empty());
    // Dropped, not retried.
    assert_eq!(h.bus.pending_len(SEND_TOPIC).await, 0);
    assert_eq!(h.bus.queued_len(SEND_TOPIC).await, 0);
}

#[tokio::test]
async fn reconciler_finishes_stuck_approvals() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;

    // Simulate an approval that crashed right after the status transition:
    // APPROVED long ago, nothing on the send topic.
    h.store
        .transition(
            101,
            NotificationStatus::PendingApproval,
            NotificationStatus::Approved,
            TransitionChangeset {
                approved_at: Some(Utc::now() - Duration::minutes(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    let reconciler = Reconciler::new(
        h.approval.clone(),
        &ReconcilerConfig {
            enabled: true,
            interval_seconds: 60,
            grace_seconds: 60,
        },
    );
    reconciler.sweep_once().await;

    let record = h.store.find_by_job_id(101).await.unwrap().unwrap();
    assert_eq!(record.status, NotificationStatus::Sent);

    h.drain_fanout().await;
    assert_eq!(h.email.sent().len(), 2);

    // A second sweep finds nothing to do.
    reconciler.sweep_once().await;
    assert_eq!(h.bus.queued_len(SEND_TOPIC).await, 0);
}

#[tokio::test]
async fn stuck_approvals_are_listed_for_operators() {
    let h = Harness::new();
    h.ingest(101, in_two_days()).await;
    h.ingest(102, in_two_days()).await;

    // 101 has been APPROVED for half an hour with no fan-out; 102 went
    // through the normal approve and reached SENT.
    h.store
        .transition(
            101,
            NotificationStatus::PendingApproval,
            NotificationStatus::Approved,
            TransitionChangeset {
                approved_at: Some(Utc::now() - Duration::minutes(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    h.approval.approve(102, "go", Vec::new()).await.unwrap();

    let stuck = h
        .approval
        .find_stuck_approved(Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].job_id, 101);
    assert_eq!(stuck[0].status, NotificationStatus::Approved);

    // A tighter window than the record's age finds nothing.
    let none = h
        .approval
        .find_stuck_approved(Duration::hours(2))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test(start_paused = true)]
async fn idle_intake_loop_backs_off_between_reads() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    use jobcast::bus::{BusError, Delivery};

    struct CountingConsumer {
        inner: MemoryEventConsumer,
        polls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl EventConsumer for CountingConsumer {
        async fn next(&self) -> Result<Option<Delivery>, BusError> {
            self.polls.fetch_add(1, Ordering::Relaxed);
            self.inner.next().await
        }

        async fn ack(&self, delivery: &Delivery) -> Result<(), BusError> {
            self.inner.ack(delivery).await
        }
    }

    let bus = MemoryEventBus::new();
    let polls = Arc::new(AtomicUsize::new(0));
    let consumer = Arc::new(CountingConsumer {
        inner: bus.consumer(INTAKE_TOPIC),
        polls: polls.clone(),
    });

    let token = CancellationToken::new();
    let pipeline = IntakePipeline::new(consumer, Arc::new(MemoryNotificationStore::new()));
    let handle = tokio::spawn(pipeline.run(token.clone()));

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    token.cancel();
    handle.await.unwrap();

    // One empty read per backoff interval; a busy spin would be thousands.
    let polled = polls.load(Ordering::Relaxed);
    assert!(polled <= 30, "idle loop read {} times in one second", polled);
}
