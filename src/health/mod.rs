//! Inference server liveness.

#[cfg(feature = "native")]
mod monitor;

#[cfg(feature = "native")]
pub use monitor::{HealthHandle, HealthMonitor};

use std::time::Duration;

use crate::models::HealthResponse;

/// Upper bound for one `/api/health` request.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
/// Polling period.
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// No result yet.
    Checking,
    Online,
    /// Server answered but the model is not loaded yet.
    ModelLoading,
    /// Server unreachable.
    Offline,
    /// Server answered with a non-2xx status or an unreadable body.
    Error,
}

impl HealthStatus {
    pub fn from_response(response: &HealthResponse) -> Self {
        if response.model_loaded {
            HealthStatus::Online
        } else {
            HealthStatus::ModelLoading
        }
    }

    /// Only a fully loaded model accepts prompts.
    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Online)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Checking => "Checking",
            HealthStatus::Online => "Server Online",
            HealthStatus::ModelLoading => "Model Loading",
            HealthStatus::Offline => "Server Offline",
            HealthStatus::Error => "Server Error",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Latest health result plus the "checking" flag shown while a manual check is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthState {
    pub status: HealthStatus,
    pub checking: bool,
    reported: bool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self { status: HealthStatus::Checking, checking: true, reported: false }
    }
}

impl HealthState {
    /// Manual check: raise the flag; the next polled result clears it.
    pub fn request_check(&mut self) {
        self.checking = true;
    }

    /// Store a polled result. Returns the readiness to report when it changed, or on the first
    /// result.
    pub fn record(&mut self, status: HealthStatus) -> Option<bool> {
        let was_ready = self.status.is_ready();
        let first = !self.reported;
        self.status = status;
        self.checking = false;
        self.reported = true;
        (first || was_ready != status.is_ready()).then_some(status.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_when_model_not_loaded() {
        let status = HealthStatus::from_response(&HealthResponse { model_loaded: false });
        assert_eq!(status, HealthStatus::ModelLoading);
        assert!(!status.is_ready());
        assert!(HealthStatus::from_response(&HealthResponse { model_loaded: true }).is_ready());
    }

    #[test]
    fn readiness_reported_on_first_result_and_changes() {
        let mut state = HealthState::default();
        assert_eq!(state.record(HealthStatus::Offline), Some(false));
        assert_eq!(state.record(HealthStatus::Error), None);
        assert_eq!(state.record(HealthStatus::Online), Some(true));
        assert_eq!(state.record(HealthStatus::Online), None);
        assert_eq!(state.record(HealthStatus::ModelLoading), Some(false));
    }

    #[test]
    fn manual_check_is_cleared_by_next_result() {
        let mut state = HealthState::default();
        state.record(HealthStatus::Online);
        state.request_check();
        assert!(state.checking);
        state.record(HealthStatus::Online);
        assert!(!state.checking);
    }
}
