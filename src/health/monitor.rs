use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::HealthState;
use crate::client::InferenceClient;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Polls `/api/health` on a fixed interval until stopped.
pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawn the polling task. The first check runs immediately.
    ///
    /// `on_readiness` receives `true`/`false` whenever readiness changes (and for the first
    /// result). It is never called after [`HealthHandle::stop`].
    pub fn start<F>(client: InferenceClient, interval: Duration, on_readiness: F) -> HealthHandle
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(HealthState::default());

        let task = tokio::spawn({
            let token = token.clone();
            let tx = tx.clone();
            async move {
                let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
                loop {
                    let status = tokio::select! {
                        _ = token.cancelled() => break,
                        status = async {
                            ticker.tick().await;
                            client.health().await
                        } => status,
                    };
                    if token.is_cancelled() {
                        break;
                    }
                    debug!("Health poll: {status}");

                    let mut changed = None;
                    tx.send_modify(|state| changed = state.record(status));
                    if let Some(ready) = changed {
                        if token.is_cancelled() {
                            break;
                        }
                        info!("Inference server readiness changed: {status}");
                        on_readiness(ready);
                    }
                }
                debug!("Health monitor stopped");
            }
        });

        HealthHandle { token, state: rx, control: tx, task }
    }
}

/// Lifecycle handle for a running [`HealthMonitor`]. Dropping it stops polling.
pub struct HealthHandle {
    token: CancellationToken,
    state: watch::Receiver<HealthState>,
    control: watch::Sender<HealthState>,
    task: JoinHandle<()>,
}

impl HealthHandle {
    pub fn current(&self) -> HealthState {
        *self.state.borrow()
    }

    /// Receiver that wakes on every recorded result.
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.state.clone()
    }

    /// Manual check. Coalesced with the next scheduled poll rather than issuing a request.
    pub fn check_now(&self) {
        self.control.send_modify(HealthState::request_check);
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for HealthHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
