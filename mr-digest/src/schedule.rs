//! Recurring timer that drives notification cycles until shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs `job` every `interval` until `shutdown` is cancelled.
///
/// The first run happens immediately when `run_on_start` is set, otherwise
/// after one full interval. Ticks missed while a job is still running are
/// delayed rather than replayed in a burst. Cancellation also abandons a job
/// that is in flight. Returns the number of completed runs.
pub async fn run_every<F, Fut>(
    interval: Duration,
    run_on_start: bool,
    shutdown: CancellationToken,
    mut job: F,
) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let start = if run_on_start {
        time::Instant::now()
    } else {
        time::Instant::now() + interval
    };
    let mut ticker = time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut runs = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        debug!(run = runs + 1, "scheduled run starting");
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, abandoning running cycle");
                break;
            }
            _ = job() => runs += 1,
        }
    }

    info!(runs, "scheduler stopped");
    runs
}
