//! clinrag-scheduler — Scheduler & Worker Pool: durable queue submission,
//! cooperative worker pool, retry/backoff, lease sweeping, and cron-like
//! periodic triggers.

pub mod error;
pub mod handler;
pub mod scheduler;
pub mod trigger;

pub use error::SchedulerError;
pub use handler::{HandlerError, TaskHandler};
pub use scheduler::{Scheduler, SchedulerConfig, StatusSnapshot, TaskState};
pub use trigger::spawn_periodic_trigger;
