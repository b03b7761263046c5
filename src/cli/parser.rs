//! CLI argument parsing with clap
//!
//! Defines the command-line interface structure, including all commands,
//! arguments and their documentation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

// Include shadow-rs generated build information
use shadow_rs::shadow;
shadow!(build);

/// Job notification approval and fan-out service
#[derive(Parser, Debug)]
#[command(name = "jobcast")]
#[command(about = "Job notification approval and fan-out service")]
#[command(long_about = "
Jobcast ingests job-eligibility events, holds each one for admin approval,
and on approval fans out one email per eligible student while maintaining a
deadline-expiring per-student visibility cache.

EXAMPLES:
    # Run the intake and fan-out pipelines
    jobcast serve

    # Validate configuration without starting anything
    jobcast serve --dry-run

    # Apply database migrations
    jobcast migrate

    # Approve a pending notification with a message and an attachment
    jobcast approve 101 --message 'Apply before the deadline.' \\
        --attachment ./jd.pdf

    # Reject a pending notification
    jobcast reject 101 --message-file ./reason.txt

    # What one student currently sees
    jobcast dashboard S1
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Use a single TOML file instead of the layered config directory.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the intake, fan-out and reconciler pipelines (default)
    Serve {
        /// Validate configuration and backends, then exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending database migrations
    Migrate,

    /// Approve a pending notification and fan out the emails
    Approve {
        /// Job identifier of the notification
        job_id: i64,

        /// Admin message, used as the email body
        #[arg(short, long, conflicts_with = "message_file")]
        message: Option<String>,

        /// Read the admin message from a text file
        #[arg(long, value_name = "FILE")]
        message_file: Option<PathBuf>,

        /// Attachment file, repeatable
        #[arg(short, long = "attachment", value_name = "FILE")]
        attachments: Vec<PathBuf>,
    },

    /// Reject a pending notification
    Reject {
        /// Job identifier of the notification
        job_id: i64,

        /// Admin message recording the reason
        #[arg(short, long, conflicts_with = "message_file")]
        message: Option<String>,

        /// Read the admin message from a text file
        #[arg(long, value_name = "FILE")]
        message_file: Option<PathBuf>,
    },

    /// List all notifications, newest first
    List,

    /// Show one notification in full
    Show {
        /// Job identifier of the notification
        job_id: i64,
    },

    /// Show the jobs currently visible to one student
    Dashboard {
        /// Student identifier
        student_id: String,
    },

    /// Operator health view: list stuck APPROVED notifications, or verify
    /// the blobs referenced by one notification
    Audit {
        /// Job identifier to blob-check; without it, list notifications
        /// stuck in APPROVED past the reconciler grace period
        job_id: Option<i64>,
    },
}
