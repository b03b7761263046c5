//! Command executor for dispatching CLI commands.

use std::path::{Path, PathBuf};

use tracing::info;

use super::parser::{Cli, Commands};
use crate::config::settings::{Settings, StoreBackend};
use crate::db::run_migrations;
use crate::error::{AppError, AppResult};
use crate::runtime::Runtime;
use crate::services::AttachmentUpload;

/// Execute a CLI command with the given settings.
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    match &cli.command {
        Some(Commands::Serve { dry_run: true }) => dry_run(settings).await,
        Some(Commands::Serve { dry_run: false }) | None => {
            let runtime = Runtime::build(settings).await?;
            runtime.run().await.map_err(AppError::from)
        }
        Some(Commands::Migrate) => migrate(settings).await,
        Some(Commands::Approve {
            job_id,
            message,
            message_file,
            attachments,
        }) => {
            approve(
                settings,
                *job_id,
                resolve_message(message.as_deref(), message_file.as_deref()).await?,
                attachments,
            )
            .await
        }
        Some(Commands::Reject {
            job_id,
            message,
            message_file,
        }) => {
            reject(
                settings,
                *job_id,
                resolve_message(message.as_deref(), message_file.as_deref()).await?,
            )
            .await
        }
        Some(Commands::List) => list(settings).await,
        Some(Commands::Show { job_id }) => show(settings, *job_id).await,
        Some(Commands::Dashboard { student_id }) => dashboard(settings, student_id).await,
        Some(Commands::Audit { job_id: Some(id) }) => audit_blobs(settings, *id).await,
        Some(Commands::Audit { job_id: None }) => audit_stuck(settings).await,
    }
}

/// Validates the configuration and exercises every backend connection.
async fn dry_run(settings: Settings) -> AppResult<()> {
    settings.validate()?;
    let _runtime = Runtime::build(settings.clone()).await?;

    println!("Configuration is valid.");
    println!("  store:   {:?}", settings.store.backend);
    println!("  cache:   {:?}", settings.cache.backend);
    println!("  bus:     {:?}", settings.bus.backend);
    println!("  blob:    {:?}", settings.blob.backend);
    println!("  email:   {:?}", settings.email.provider);
    println!("  topics:  {} -> {}", settings.bus.intake_topic, settings.bus.send_topic);
    Ok(())
}

async fn migrate(settings: Settings) -> AppResult<()> {
    if settings.store.backend != StoreBackend::Postgres {
        return Err(AppError::Validation {
            field: "store.backend".to_string(),
            reason: "migrations only apply to the postgres store".to_string(),
        });
    }

    let applied = run_migrations(&settings.store.url).await?;
    info!(applied, "migrations complete");
    println!("Applied {} migration(s).", applied);
    Ok(())
}

async fn approve(
    settings: Settings,
    job_id: i64,
    message: String,
    attachment_paths: &[PathBuf],
) -> AppResult<()> {
    let mut attachments = Vec::with_capacity(attachment_paths.len());
    for path in attachment_paths {
        attachments.push(read_attachment(path).await?);
    }

    let runtime = Runtime::build(settings).await?;
    let outcome = runtime
        .state
        .services
        .approval
        .approve(job_id, &message, attachments)
        .await?;

    println!(
        "Enqueued {} email(s), uploaded {} attachment(s).",
        outcome.emails_enqueued, outcome.attachments_uploaded
    );
    print_json(&outcome.notification)
}

async fn reject(settings: Settings, job_id: i64, message: String) -> AppResult<()> {
    let runtime = Runtime::build(settings).await?;
    let notification = runtime
        .state
        .services
        .approval
        .reject(job_id, &message)
        .await?;

    print_json(&notification)
}

async fn list(settings: Settings) -> AppResult<()> {
    let runtime = Runtime::build(settings).await?;
    let summaries = runtime.state.services.approval.list_summaries().await?;
    print_json(&summaries)
}

async fn show(settings: Settings, job_id: i64) -> AppResult<()> {
    let runtime = Runtime::build(settings).await?;
    let notification = runtime.state.services.approval.get_by_job_id(job_id).await?;
    print_json(&notification)
}

async fn dashboard(settings: Settings, student_id: &str) -> AppResult<()> {
    let runtime = Runtime::build(settings).await?;
    let snapshot = runtime.state.services.dashboard.snapshot(student_id).await?;
    print_json(&snapshot)
}

/// Lists notifications stuck in APPROVED past the reconciler grace period,
/// the records the sweep would pick up.
async fn audit_stuck(settings: Settings) -> AppResult<()> {
    let grace = chrono::Duration::seconds(settings.reconciler.grace_seconds as i64);
    let runtime = Runtime::build(settings).await?;
    let stuck = runtime
        .state
        .services
        .approval
        .find_stuck_approved(grace)
        .await?;

    if stuck.is_empty() {
        println!("No notifications stuck in APPROVED.");
        return Ok(());
    }

    println!(
        "{} notification(s) APPROVED for more than {}s:",
        stuck.len(),
        grace.num_seconds()
    );
    for notification in &stuck {
        println!(
            "  job {}  {}  approved_at={}  students={}",
            notification.job_id,
            notification.company_name,
            notification
                .approved_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            notification.eligible_count
        );
    }
    Ok(())
}

/// Stats every blob a notification references and reports missing ones.
async fn audit_blobs(settings: Settings, job_id: i64) -> AppResult<()> {
    let runtime = Runtime::build(settings).await?;
    let notification = runtime.state.services.approval.get_by_job_id(job_id).await?;

    let mut paths = Vec::new();
    if let Some(ref message_file) = notification.admin_message_text_file {
        paths.push(message_file.clone());
    }
    if let Some(ref attachments) = notification.attachments {
        paths.extend(attachments.0.iter().cloned());
    }

    if paths.is_empty() {
        println!("Job {} references no blobs.", job_id);
        return Ok(());
    }

    let mut missing = 0usize;
    for path in &paths {
        match runtime.state.blobs.stat(path).await {
            Ok(stat) => {
                println!("OK       {} ({} bytes, {})", path, stat.size, stat.content_type);
            }
            Err(e) => {
                missing += 1;
                println!("MISSING  {} ({})", path, e);
            }
        }
    }

    if missing > 0 {
        return Err(AppError::BadRequest {
            message: format!("{} of {} referenced blob(s) missing", missing, paths.len()),
        });
    }
    Ok(())
}

/// The admin message from either flag; absent means empty.
async fn resolve_message(message: Option<&str>, message_file: Option<&Path>) -> AppResult<String> {
    match (message, message_file) {
        (Some(message), _) => Ok(message.to_string()),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::BadRequest {
                message: format!("cannot read message file {}: {}", path.display(), e),
            }),
        (None, None) => Ok(String::new()),
    }
}

async fn read_attachment(path: &Path) -> AppResult<AttachmentUpload> {
    let bytes = tokio::fs::read(path).await.map_err(|e| AppError::BadRequest {
        message: format!("cannot read attachment {}: {}", path.display(), e),
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    let content_type = content_type_for(&file_name).to_string();

    Ok(AttachmentUpload {
        file_name,
        content_type,
        bytes,
    })
}

/// Minimal extension-based content type mapping for CLI uploads.
fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| AppError::Internal {
        source: anyhow::Error::new(e),
    })?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_cover_common_extensions() {
        assert_eq!(content_type_for("jd.pdf"), "application/pdf");
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("mystery"), "application/octet-stream");
    }
}
