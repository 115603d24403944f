//! Percentage-based staged rollout.
//!
//! Each client is placed in a stable bucket per feature (see [`Sharder::bucket`]) and is in the
//! rollout iff its bucket is below the configured percentage. The decision is materialized as a
//! client setting tagged `generated_by_rollout` so that it survives later percentage changes
//! according to the retention rules in [`assign`].
use serde_json::Value;

use crate::{
    settings::{ClientSetting, ExtraData, SettingId, ASSIGNED_BY_PERCENTAGE, GENERATED_BY_ROLLOUT},
    sharder::Sharder,
    status::ClientStatus,
};

/// What the caller has to write to persist a rollout decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloutAction {
    /// Nothing to write.
    None,
    Create {
        status: ClientStatus,
        extra_data: ExtraData,
    },
    Update {
        id: SettingId,
        status: ClientStatus,
        extra_data: ExtraData,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Whether the client's bucket falls inside the rollout. `false` when the percentage is out
    /// of range.
    pub bucketed: bool,
    pub action: RolloutAction,
}

impl Assignment {
    fn unchanged(bucketed: bool) -> Self {
        Assignment {
            bucketed,
            action: RolloutAction::None,
        }
    }
}

/// Percentages outside `(0, 100]` disable bucketing altogether.
pub fn is_valid_percentage(percentage: i64) -> bool {
    (1..=100).contains(&percentage)
}

/// `true` if the client falls within the first `percentage` buckets of the feature.
pub fn in_rollout(
    sharder: &impl Sharder,
    client_uuid: &str,
    feature_name: &str,
    percentage: i64,
) -> bool {
    is_valid_percentage(percentage)
        && sharder.bucket(client_uuid, feature_name) < percentage.unsigned_abs()
}

/// Decide how the rollout affects `existing` for the given client.
///
/// - Without a client setting, one is created with the bucket decision.
/// - Administrative overrides (not generated by rollout) are never touched.
/// - Rollout-generated rows are revisited only when the percentage has moved since they were
///   written. A whitelisted client stays whitelisted while the percentage grows, a blacklisted
///   client stays blacklisted while it shrinks; otherwise the bucket decides. The recorded
///   percentage is advanced in every case.
pub fn assign(
    sharder: &impl Sharder,
    client_uuid: &str,
    feature_name: &str,
    percentage: i64,
    existing: Option<&ClientSetting>,
) -> Assignment {
    if !is_valid_percentage(percentage) {
        return Assignment::unchanged(false);
    }

    let bucketed = in_rollout(sharder, client_uuid, feature_name, percentage);

    let Some(existing) = existing else {
        return Assignment {
            bucketed,
            action: RolloutAction::Create {
                status: ClientStatus::from_rollout(bucketed),
                extra_data: rollout_extra_data(None, percentage),
            },
        };
    };

    if !existing.generated_by_rollout() {
        return Assignment::unchanged(bucketed);
    }

    let previous = existing.assigned_by_percentage();
    if previous == Some(percentage) {
        return Assignment::unchanged(bucketed);
    }

    let status = match (existing.status, previous) {
        (ClientStatus::Whitelisted, Some(previous)) if percentage >= previous => {
            ClientStatus::Whitelisted
        }
        (ClientStatus::Blacklisted, Some(previous)) if percentage <= previous => {
            ClientStatus::Blacklisted
        }
        (ClientStatus::Whitelisted | ClientStatus::Blacklisted, _) => {
            ClientStatus::from_rollout(bucketed)
        }
        (ClientStatus::DisabledByClient, _) => ClientStatus::DisabledByClient,
    };

    Assignment {
        bucketed,
        action: RolloutAction::Update {
            id: existing.id,
            status,
            extra_data: rollout_extra_data(existing.extra_data.as_ref(), percentage),
        },
    }
}

/// Extra data of a rollout-generated row, keeping any unrelated keys already present.
fn rollout_extra_data(current: Option<&ExtraData>, percentage: i64) -> ExtraData {
    let mut extra_data = current.cloned().unwrap_or_default();
    extra_data.insert(GENERATED_BY_ROLLOUT.to_owned(), Value::Bool(true));
    extra_data.insert(ASSIGNED_BY_PERCENTAGE.to_owned(), Value::from(percentage));
    extra_data
}
