//! Object naming and public path mapping.
//!
//! Object names are `{prefix}-{millis}-{suffix}-{sanitized-file-name}` where
//! the prefix scopes by job id and purpose. The public form handed around in
//! records and events is `/api/files/{url-encoded-object-name}`.

use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::blob::BlobError;

const FILE_API_PREFIX: &str = "/api/files/";

// Unreserved characters stay readable in the public path.
const OBJECT_NAME_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn build_object_name(prefix: &str, file_name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}",
        prefix,
        Utc::now().timestamp_millis(),
        &suffix[..6],
        sanitize_file_name(file_name)
    )
}

/// Public path for a job attachment.
pub fn attachment_path(job_id: i64, file_name: &str) -> String {
    to_api_path(&build_object_name(
        &format!("job-{}-attachment", job_id),
        file_name,
    ))
}

/// Public path for the admin message written during approve/reject.
/// `action` is "approve" or "reject".
pub fn admin_message_path(job_id: i64, action: &str) -> String {
    to_api_path(&build_object_name(
        &format!("job-{}-{}-message", job_id, action),
        "message.txt",
    ))
}

/// Public path for the long email body of a job.
pub fn email_body_path(job_id: i64) -> String {
    to_api_path(&build_object_name(
        &format!("job-{}-email-body", job_id),
        "body.txt",
    ))
}

fn to_api_path(object_name: &str) -> String {
    format!(
        "{}{}",
        FILE_API_PREFIX,
        utf8_percent_encode(object_name, OBJECT_NAME_ENCODE)
    )
}

/// Resolves a public path back to the stored object name.
pub fn object_name_from_api_path(api_path: &str) -> Result<String, BlobError> {
    let Some(encoded) = api_path.strip_prefix(FILE_API_PREFIX) else {
        return Err(BlobError::InvalidPath(api_path.to_string()));
    };
    if encoded.is_empty() {
        return Err(BlobError::InvalidPath(api_path.to_string()));
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| BlobError::InvalidPath(api_path.to_string()))
}

/// Recovers the original (sanitized) file name from an attachment path,
/// for display in outgoing mail. Falls back to the full object name when
/// the name does not follow the attachment shape.
pub fn attachment_file_name(api_path: &str) -> Result<String, BlobError> {
    let object_name = object_name_from_api_path(api_path)?;

    // job-{id}-attachment-{millis}-{rand}-{file-name}
    let mut parts = object_name.splitn(6, '-');
    let shape = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    );
    match shape {
        (Some("job"), Some(_), Some("attachment"), Some(_), Some(_), Some(name))
            if !name.is_empty() =>
        {
            Ok(name.to_string())
        }
        _ => Ok(object_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_paths_are_scoped_and_sanitized() {
        let path = attachment_path(42, "offer letter (final).pdf");
        assert!(path.starts_with("/api/files/job-42-attachment-"));
        let object = object_name_from_api_path(&path).unwrap();
        assert!(object.ends_with("offer_letter__final_.pdf"));
        assert!(!object.contains(' '));
    }

    #[test]
    fn api_path_round_trip() {
        let path = email_body_path(7);
        let object = object_name_from_api_path(&path).unwrap();
        assert!(object.starts_with("job-7-email-body-"));
    }

    #[test]
    fn bogus_paths_are_rejected() {
        assert!(object_name_from_api_path("/elsewhere/x").is_err());
        assert!(object_name_from_api_path("/api/files/").is_err());
    }

    #[test]
    fn attachment_file_name_survives_dashes() {
        let path = attachment_path(42, "joining-letter-v2.pdf");
        assert_eq!(
            attachment_file_name(&path).unwrap(),
            "joining-letter-v2.pdf"
        );
    }

    #[test]
    fn object_names_are_unique_per_call() {
        assert_ne!(admin_message_path(1, "approve"), admin_message_path(1, "approve"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// Whatever the admin names an attachment, the resulting public
            /// path resolves back to a job-scoped object name made only of
            /// filesystem-safe characters.
            #[test]
            fn any_file_name_yields_resolvable_path(name in ".{1,40}") {
                let path = attachment_path(9, &name);
                let object = object_name_from_api_path(&path).unwrap();
                prop_assert!(object.starts_with("job-9-attachment-"));
                prop_assert!(
                    object
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
                );
            }
        }
    }
}
