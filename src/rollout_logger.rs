use serde::{Deserialize, Serialize};

use crate::status::ClientStatus;

/// Whether a rollout write created a new client setting or revised an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutEventAction {
    Created,
    Updated,
}

/// Emitted whenever the rollout assigner persists a client setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutEvent {
    pub feature: String,
    pub client_uuid: String,
    pub status: ClientStatus,
    pub percentage: i64,
    /// Percentage recorded on the row before this write, if it existed.
    pub previous_percentage: Option<i64>,
    pub action: RolloutEventAction,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Receives rollout events, e.g. to record which clients entered a staged release.
pub trait RolloutLogger {
    fn log_rollout(&self, event: RolloutEvent);
}

pub(crate) struct NoopRolloutLogger;
impl RolloutLogger for NoopRolloutLogger {
    fn log_rollout(&self, _event: RolloutEvent) {}
}

impl<T: Fn(RolloutEvent)> RolloutLogger for T {
    fn log_rollout(&self, event: RolloutEvent) {
        self(event);
    }
}
