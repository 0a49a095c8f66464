//! Cron-like periodic triggers: evaluated in UTC, each firing enqueues
//! exactly one task, deduplicated per window so an overlapping tick never
//! double-enqueues.

use std::sync::Arc;

use chrono::Utc;
use clinrag_config::normalize_cron;
use clinrag_db::queue::window_dedup_key;
use cron::Schedule;
use serde_json::Value;
use std::str::FromStr;

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

/// Spawns a loop that sleeps until each upcoming firing of `cron_expr`,
/// then enqueues `task_kind` with `payload`, deduplicated by window.
/// Runs until the process exits; callers abort the returned handle to stop.
pub fn spawn_periodic_trigger(
    scheduler: Arc<Scheduler>,
    task_kind: String,
    cron_expr: String,
    payload: Value,
) -> Result<tokio::task::JoinHandle<()>, SchedulerError> {
    let schedule = Schedule::from_str(&normalize_cron(&cron_expr))
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

    Ok(tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next_fire) = schedule.after(&now).next() else {
                tracing::error!(task_kind, "cron schedule has no further firings");
                return;
            };
            let wait = (next_fire - now).to_std().unwrap_or(std::time::Duration::from_secs(1));
            tokio::time::sleep(wait).await;

            let dedup_key = window_dedup_key(&task_kind, next_fire);
            match scheduler.submit_with_dedup(&task_kind, payload.clone(), Some(&dedup_key)).await {
                Ok(id) => tracing::info!(task_kind, job_id = %id, "periodic trigger fired"),
                Err(e) => tracing::error!(task_kind, error = %e, "periodic trigger enqueue failed"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_an_invalid_cron_expression() {
        let bad = Schedule::from_str(&normalize_cron("not a cron expr"));
        assert!(bad.is_err());
    }
}
