//! Domain models: the notification record, its status state machine, and the
//! wire events exchanged over the bus.

pub mod events;
pub mod notification;

pub use events::{PendingNotificationEvent, SendEmailEvent, parse_pending_event};
pub use notification::{
    AttachmentPaths, EligibleStudent, EligibleStudents, NewNotification, Notification,
    NotificationStatus, NotificationSummary, TransitionChangeset,
};
