//! Merge request digest pipeline.
//!
//! group → subgroups → projects → open merge requests → approvals →
//! per-project summary → webhook.
//!
//! [`Notifier::run_cycle`] performs one pass over every configured target;
//! [`run_every`] repeats it on a timer until shutdown.

pub mod collect;
pub mod config;
mod errors;
pub mod notifier;
pub mod schedule;
pub mod summary;

pub use config::{NotifyConfig, Settings};
pub use errors::{ConfigError, DigestError, DigestResult};
pub use notifier::{CycleReport, Delivery, Notifier};
pub use schedule::run_every;
