use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs fire-and-forget work off the request path with its own deadline.
/// Failures and timeouts are logged here and nowhere else.
pub fn spawn_detached<F>(task: &'static str, deadline: Duration, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match timeout(deadline, fut).await {
            Ok(Ok(())) => debug!(task, "Detached task finished"),
            Ok(Err(e)) => warn!(task, "Detached task failed: {:#}", e),
            Err(_) => warn!(task, "Detached task timed out after {:?}", deadline),
        }
    })
}

/// A background sweep run on a fixed interval.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn sweep(&self) -> Result<()>;
}

const MIN_PERIOD: Duration = Duration::from_secs(1);

struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ticks every `period` (at least one second) until `shutdown` fires. Each
/// iteration runs in its own task bounded by `iteration_timeout`; a tick that
/// finds the previous iteration still running is skipped, and missed ticks are
/// never queued.
pub async fn run_periodic(
    sweep: Arc<dyn Sweep>,
    period: Duration,
    iteration_timeout: Duration,
    shutdown: CancellationToken,
) {
    let name = sweep.name();
    let period = period.max(MIN_PERIOD);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let running = Arc::new(AtomicBool::new(false));

    info!("Starting {} with interval {:?}", name, period);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Stopping {}", name);
                break;
            }
            _ = ticker.tick() => {}
        }

        if running.swap(true, Ordering::AcqRel) {
            debug!("{}: previous sweep still running, skipping tick", name);
            continue;
        }

        let flag = RunningFlag(running.clone());
        let sweep = sweep.clone();
        tokio::spawn(async move {
            let _flag = flag;
            match timeout(iteration_timeout, sweep.sweep()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{} sweep failed: {:#}", name, e),
                Err(_) => warn!("{} sweep exceeded {:?}, abandoned", name, iteration_timeout),
            }
        });
    }
}
