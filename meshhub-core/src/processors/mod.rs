//! Long-running pieces of the pipeline.
//!
//! - `EventRouter`: Receives transport messages, persists them, emits `WebhookEvent`
//! - `WebhookSender`: Receives `WebhookEvent`, delivers webhooks
//! - `CleanupScheduler`: Timer driven, purges expired rows

pub mod cleanup;
pub mod router;
pub mod webhook_sender;

pub use cleanup::{CleanupError, CleanupReport, CleanupScheduler, LastRun};
pub use router::{EventRouter, RouteOutcome};
pub use webhook_sender::{WebhookDispatcher, WebhookError, WebhookSender};
