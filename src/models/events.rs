//! Wire events consumed and produced by the pipelines.
//!
//! Field names are camelCase on the wire, matching the upstream producer and
//! the downstream email consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::models::notification::{
    EligibleStudent, EligibleStudents, NewNotification, NotificationStatus,
};

/// Payload of one externally-produced "pending notification" event.
///
/// Carries the full creation payload for one job. `criteria` is an opaque
/// structured filter used upstream and stored verbatim.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotificationEvent {
    #[validate(range(min = 1, message = "jobId must be a positive integer"))]
    pub job_id: i64,
    #[validate(length(min = 1, message = "companyName must not be empty"))]
    pub company_name: String,
    pub criteria: JsonValue,
    #[validate(nested)]
    pub eligible_students: Vec<EligibleStudent>,
    #[validate(range(min = 0, message = "eligibleCount must be non-negative"))]
    pub eligible_count: i32,
    pub application_deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl PendingNotificationEvent {
    /// Builds the insert model, stamping `created_at` and the initial status.
    pub fn into_new_notification(self, now: DateTime<Utc>) -> NewNotification {
        NewNotification {
            job_id: self.job_id,
            company_name: self.company_name,
            criteria: self.criteria,
            eligible_count: self.eligible_count,
            eligible_students: EligibleStudents(self.eligible_students),
            application_deadline: self.application_deadline,
            status: NotificationStatus::PendingApproval,
            created_at: now,
        }
    }
}

/// Evaluates raw bytes from the intake topic into either a typed event or a
/// list of reasons. Pure function; the pipeline acks and drops on `Err`.
pub fn parse_pending_event(payload: &[u8]) -> Result<PendingNotificationEvent, Vec<String>> {
    if payload.is_empty() {
        return Err(vec!["empty message value".to_string()]);
    }

    let event: PendingNotificationEvent = serde_json::from_slice(payload)
        .map_err(|e| vec![format!("invalid JSON payload: {}", e)])?;

    event.validate().map_err(|errors| {
        let mut reasons: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter()
                    .map(move |e| {
                        let detail = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        format!("{}: {}", field, detail)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        // Nested (per-student) failures are not surfaced by field_errors.
        if reasons.is_empty() {
            reasons.push(errors.to_string());
        }
        reasons
    })?;

    Ok(event)
}

/// One fan-out unit of work: deliver one job's email to one student.
///
/// Produced by the approval engine (one message per eligible student, keyed
/// by `jobId` for partition affinity) and consumed by the fan-out pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailEvent {
    pub job_id: i64,
    pub company_name: String,
    pub student_name: String,
    pub student_email: String,
    pub email_body_path: String,
    pub email_body_bucket: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl SendEmailEvent {
    /// Subject line derived from the company name, as sent by the original
    /// email consumer.
    pub fn subject(&self) -> String {
        format!("Placement Opportunity — {}", self.company_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "jobId": 101,
            "companyName": "Acme",
            "criteria": {"minCgpa": 7.5},
            "eligibleStudents": [
                {"student_id": "S1", "full_name": "Asha Rao", "email": "asha@example.edu"},
                {"student_id": "S2", "full_name": "Vikram Iyer", "email": "vikram@example.edu"}
            ],
            "eligibleCount": 2,
            "applicationDeadline": "2026-09-30T18:00:00Z"
        })
    }

    #[test]
    fn valid_payload_parses() {
        let bytes = serde_json::to_vec(&sample_payload()).unwrap();
        let event = parse_pending_event(&bytes).unwrap();
        assert_eq!(event.job_id, 101);
        assert_eq!(event.eligible_students.len(), 2);
        assert_eq!(event.eligible_count, 2);
        assert!(event.processed_at.is_none());
    }

    #[test]
    fn empty_payload_is_rejected() {
        let reasons = parse_pending_event(b"").unwrap_err();
        assert_eq!(reasons, vec!["empty message value".to_string()]);
    }

    #[test]
    fn garbage_payload_is_rejected() {
        let reasons = parse_pending_event(b"{not json").unwrap_err();
        assert!(reasons[0].starts_with("invalid JSON payload"));
    }

    #[test]
    fn non_positive_job_id_is_rejected() {
        let mut payload = sample_payload();
        payload["jobId"] = serde_json::json!(0);
        let bytes = serde_json::to_vec(&payload).unwrap();
        let reasons = parse_pending_event(&bytes).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("jobId")));
    }

    #[test]
    fn invalid_student_email_is_rejected() {
        let mut payload = sample_payload();
        payload["eligibleStudents"][1]["email"] = serde_json::json!("not-an-email");
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert!(parse_pending_event(&bytes).is_err());
    }

    #[test]
    fn send_event_round_trips_camel_case() {
        let event = SendEmailEvent {
            job_id: 7,
            company_name: "Globex".to_string(),
            student_name: "Asha Rao".to_string(),
            student_email: "asha@example.edu".to_string(),
            email_body_path: "/api/files/job-7-email-body".to_string(),
            email_body_bucket: "jobcast".to_string(),
            attachments: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["jobId"], 7);
        assert_eq!(json["studentEmail"], "asha@example.edu");
        let back: SendEmailEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn subject_includes_company_name() {
        let event = SendEmailEvent {
            job_id: 7,
            company_name: "Globex".to_string(),
            student_name: String::new(),
            student_email: String::new(),
            email_body_path: String::new(),
            email_body_bucket: String::new(),
            attachments: vec![],
        };
        assert_eq!(event.subject(), "Placement Opportunity — Globex");
    }
}
