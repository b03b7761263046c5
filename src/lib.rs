//! Jobcast Library
//!
//! Core library modules for the jobcast notification service.

use shadow_rs::shadow;
shadow!(build);

pub mod blob;
pub mod bus;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod logger;
pub mod models;
pub mod pipelines;
pub mod repositories;
pub mod runtime;
pub mod schema;
pub mod services;
pub mod state;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
