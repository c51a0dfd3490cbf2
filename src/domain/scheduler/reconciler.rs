use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::domain::scheduler::scheduler::Scheduler;

/// Drives `Scheduler::reconcile` every `period` until `shutdown` is cancelled.
///
/// Grace periods only lapse when somebody looks at them, so a long running scheduler needs this
/// loop (or an equivalent caller) to turn expired deadlines into forced releases.
pub fn spawn_reconciler(scheduler: Arc<Mutex<Scheduler>>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Reconciler started, period {:?}.", period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let mut scheduler = scheduler.lock().await;
                    match scheduler.reconcile() {
                        Ok(report) if !report.is_empty() => {
                            log::debug!("Reconcile tick: released {:?}, admitted {:?}.", report.forced_releases, report.admitted);
                        }
                        Ok(_) => {}
                        Err(e) => log::error!("Reconcile tick failed: {}", e),
                    }
                }
            }
        }

        log::info!("Reconciler stopped.");
    })
}
