//! Notification record models and the status state machine.
//!
//! One `Notification` row exists per job identifier. The status enum carries
//! an explicit transition table; every mutation goes through the store's
//! single conditional update, so a status can only ever move forward along
//! the allowed edges.

use chrono::{DateTime, Utc};
use diesel::AsExpression;
use diesel::FromSqlRow;
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::{Jsonb, Text};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io::Write;

// ============================================================================
// Status enum + transition table
// ============================================================================

/// Lifecycle status of a job notification.
///
/// `PendingApproval` is the initial state set by the intake pipeline.
/// `Rejected` and `Sent` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    PendingApproval,
    Approved,
    Rejected,
    Sent,
}

impl NotificationStatus {
    /// The complete transition table. Anything not listed here is forbidden,
    /// including every backward edge.
    pub fn allowed_transitions(self) -> &'static [NotificationStatus] {
        match self {
            NotificationStatus::PendingApproval => {
                &[NotificationStatus::Approved, NotificationStatus::Rejected]
            }
            NotificationStatus::Approved => &[NotificationStatus::Sent],
            NotificationStatus::Rejected => &[],
            NotificationStatus::Sent => &[],
        }
    }

    pub fn can_transition_to(self, to: NotificationStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Wire/storage representation, identical to the upstream topic values.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::PendingApproval => "PENDING_APPROVAL",
            NotificationStatus::Approved => "APPROVED",
            NotificationStatus::Rejected => "REJECTED",
            NotificationStatus::Sent => "SENT",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl diesel::query_builder::QueryId for NotificationStatus {
    type QueryId = NotificationStatus;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for NotificationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for NotificationStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "PENDING_APPROVAL" => Ok(NotificationStatus::PendingApproval),
            "APPROVED" => Ok(NotificationStatus::Approved),
            "REJECTED" => Ok(NotificationStatus::Rejected),
            "SENT" => Ok(NotificationStatus::Sent),
            _ => Err(format!("Unrecognized notification status: {}", s).into()),
        }
    }
}

// ============================================================================
// JSONB wrappers
// ============================================================================

/// One student identified upstream as qualifying for a job, fixed at
/// creation time. Field names match the upstream payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, validator::Validate)]
pub struct EligibleStudent {
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub student_id: String,
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub full_name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

/// Ordered, immutable set of eligible students stored as JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, Default)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct EligibleStudents(pub Vec<EligibleStudent>);

impl EligibleStudents {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EligibleStudent> {
        self.0.iter()
    }
}

impl diesel::query_builder::QueryId for EligibleStudents {
    type QueryId = EligibleStudents;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Jsonb, Pg> for EligibleStudents {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        // JSONB wire format: version byte followed by the JSON text.
        out.write_all(&[1])?;
        serde_json::to_writer(out, &self.0)?;
        Ok(IsNull::No)
    }
}

impl FromSql<Jsonb, Pg> for EligibleStudents {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let bytes = value.as_bytes();
        if bytes.first() != Some(&1) {
            return Err("Unsupported JSONB encoding version".into());
        }
        Ok(EligibleStudents(serde_json::from_slice(&bytes[1..])?))
    }
}

/// Blob paths of the attachments uploaded during approve, stored as JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow, Default)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct AttachmentPaths(pub Vec<String>);

impl diesel::query_builder::QueryId for AttachmentPaths {
    type QueryId = AttachmentPaths;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Jsonb, Pg> for AttachmentPaths {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(&[1])?;
        serde_json::to_writer(out, &self.0)?;
        Ok(IsNull::No)
    }
}

impl FromSql<Jsonb, Pg> for AttachmentPaths {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let bytes = value.as_bytes();
        if bytes.first() != Some(&1) {
            return Err("Unsupported JSONB encoding version".into());
        }
        Ok(AttachmentPaths(serde_json::from_slice(&bytes[1..])?))
    }
}

// ============================================================================
// Notification models (Query/Insert/Transition)
// ============================================================================

/// Notification query model for SELECT operations.
///
/// `eligible_count` is denormalized and always equals
/// `eligible_students.len()` for records created through the intake pipeline.
#[derive(Debug, Queryable, Selectable, Serialize, Clone, PartialEq)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub job_id: i64,
    pub company_name: String,
    pub criteria: JsonValue,
    pub eligible_students: EligibleStudents,
    pub eligible_count: i32,
    pub application_deadline: DateTime<Utc>,
    pub status: NotificationStatus,
    pub admin_message: Option<String>,
    pub admin_message_text_file: Option<String>,
    pub attachments: Option<AttachmentPaths>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Deadline as epoch seconds, the visibility-cache score.
    pub fn deadline_epoch_seconds(&self) -> i64 {
        self.application_deadline.timestamp()
    }
}

/// NewNotification insert model for the intake insert-if-absent.
#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub job_id: i64,
    pub company_name: String,
    pub criteria: JsonValue,
    pub eligible_students: EligibleStudents,
    pub eligible_count: i32,
    pub application_deadline: DateTime<Utc>,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

/// Field updates applied together with a status transition.
///
/// `None` fields are left untouched by the conditional update; admin fields
/// are only ever set on the transition out of `PendingApproval`.
#[derive(Debug, AsChangeset, Clone, Default)]
#[diesel(table_name = crate::schema::notifications)]
pub struct TransitionChangeset {
    pub admin_message: Option<String>,
    pub admin_message_text_file: Option<String>,
    pub attachments: Option<AttachmentPaths>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

/// Summary projection used by admin listings and the dashboard read path.
#[derive(Debug, Queryable, Selectable, Serialize, Clone, PartialEq)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    pub job_id: i64,
    pub company_name: String,
    pub eligible_count: i32,
    pub status: NotificationStatus,
    pub application_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl From<&Notification> for NotificationSummary {
    fn from(n: &Notification) -> Self {
        NotificationSummary {
            job_id: n.job_id,
            company_name: n.company_name.clone(),
            eligible_count: n.eligible_count,
            status: n.status,
            application_deadline: n.application_deadline,
            created_at: n.created_at,
            approved_at: n.approved_at,
            rejected_at: n.rejected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_forward_edges_only() {
        use NotificationStatus::*;

        assert!(PendingApproval.can_transition_to(Approved));
        assert!(PendingApproval.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Sent));

        assert!(!PendingApproval.can_transition_to(Sent));
        assert!(!Approved.can_transition_to(PendingApproval));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Sent.can_transition_to(PendingApproval));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(NotificationStatus::Rejected.is_terminal());
        assert!(NotificationStatus::Sent.is_terminal());
        assert!(!NotificationStatus::PendingApproval.is_terminal());
        assert!(!NotificationStatus::Approved.is_terminal());
    }

    #[test]
    fn status_round_trips_through_wire_strings() {
        for status in [
            NotificationStatus::PendingApproval,
            NotificationStatus::Approved,
            NotificationStatus::Rejected,
            NotificationStatus::Sent,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: NotificationStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn any_status() -> impl Strategy<Value = NotificationStatus> {
            prop_oneof![
                Just(NotificationStatus::PendingApproval),
                Just(NotificationStatus::Approved),
                Just(NotificationStatus::Rejected),
                Just(NotificationStatus::Sent),
            ]
        }

        proptest! {
            // No path through the table ever re-enters the initial state or
            // leaves a terminal one.
            #[test]
            fn transitions_never_go_backward(from in any_status(), to in any_status()) {
                if from.can_transition_to(to) {
                    prop_assert_ne!(to, NotificationStatus::PendingApproval);
                    prop_assert!(!from.is_terminal());
                    prop_assert_ne!(from, to);
                }
            }

            // Chaining any two allowed edges always ends in a terminal state.
            #[test]
            fn two_hops_reach_a_terminal_state(
                first in any_status(),
                second in any_status(),
                third in any_status(),
            ) {
                if first.can_transition_to(second) && second.can_transition_to(third) {
                    prop_assert!(third.is_terminal());
                }
            }
        }
    }
}
