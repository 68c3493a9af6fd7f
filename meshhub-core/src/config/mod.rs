//! Runtime configuration types for the pipeline.
//!
//! These are the validated, in-memory forms. Reading them from disk is the
//! server crate's job.

mod cleanup;
mod config_store;
mod webhook;

pub use cleanup::CleanupConfig;
pub use config_store::{ConfigStore, ConfigWatcher};
pub use webhook::{WebhookConfig, WebhookFilter};
