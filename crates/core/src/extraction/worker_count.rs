use std::thread;

use crate::shared::constants::MAX_WORKERS_ENV;

/// Number of extraction workers for one call.
///
/// An explicit override wins, then the `MAX_WORKERS` environment variable,
/// then half the available parallelism. Never less than one.
pub fn resolve_worker_count(explicit: Option<usize>) -> usize {
    let from_env = || parse_worker_count(std::env::var(MAX_WORKERS_ENV).ok().as_deref());
    explicit
        .or_else(from_env)
        .unwrap_or_else(default_worker_count)
        .max(1)
}

fn parse_worker_count(value: Option<&str>) -> Option<usize> {
    let value = value?.trim();
    match value.parse::<usize>() {
        Ok(count) if count > 0 => Some(count),
        _ => {
            log::warn!("Ignoring invalid {MAX_WORKERS_ENV}={value:?}");
            None
        }
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
}
