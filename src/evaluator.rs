use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use serde_json::Value;

#[cfg(doc)]
use crate::FailurePolicy;
use crate::{
    admin::Admin,
    cache::SessionCache,
    repository::{SettingsRepository, WriteOutcome},
    rollout::{self, RolloutAction},
    rollout_logger::{RolloutEvent, RolloutEventAction},
    settings::{ClientSetting, GlobalSetting},
    sharder::Md5Sharder,
    EvaluatorConfig, Error, Result,
};

/// Answers whether a feature is enabled for a client.
///
/// An `Evaluator` serves a single evaluation session: lookups are memoized in the
/// [`SessionCache`] it was created with, so repeated checks within the session hit the repository
/// at most once for global settings and once per client. The evaluator is `Sync` and may be shared
/// between threads evaluating different features for the same session.
///
/// # Examples
/// ```
/// # use std::sync::Arc;
/// # use feature_toggles::{Evaluator, EvaluatorConfig, InMemoryRepository, SessionCache};
/// let evaluator = Evaluator::new(
///     Arc::new(InMemoryRepository::new()),
///     Arc::new(SessionCache::new()),
///     EvaluatorConfig::new(),
/// );
/// assert!(!evaluator.enabled("unknown-feature", "client-uuid"));
/// ```
pub struct Evaluator<'a> {
    repository: Arc<dyn SettingsRepository>,
    cache: Arc<SessionCache>,
    sharder: Md5Sharder,
    config: EvaluatorConfig<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        repository: Arc<dyn SettingsRepository>,
        cache: Arc<SessionCache>,
        config: EvaluatorConfig<'a>,
    ) -> Self {
        Evaluator {
            repository,
            cache,
            sharder: Md5Sharder,
            config,
        }
    }

    /// Check whether `feature` is enabled for `client_uuid`, materializing the client's rollout
    /// assignment if the feature is under a staged rollout.
    ///
    /// Storage errors are logged and resolved with the configured [`FailurePolicy`].
    pub fn enabled(&self, feature: &str, client_uuid: &str) -> bool {
        self.try_enabled(feature, client_uuid)
            .unwrap_or_else(|err| self.fallback(feature, client_uuid, &err))
    }

    /// Same as [`Evaluator::enabled`] but returns storage errors to the caller.
    ///
    /// Resolution order:
    /// 1. Missing or hard-disabled features are off, before any client lookup.
    /// 2. A rollout percentage on an enabled feature may create or revise the client setting.
    /// 3. A whitelisted client setting turns the feature on; any other client setting turns it
    ///    off; without one the global status decides.
    ///
    /// # Errors
    ///
    /// - [`Error::Storage`] if the repository fails.
    ///
    /// A rollout write the repository rejects is logged and leaves the client's current setting
    /// in effect.
    pub fn try_enabled(&self, feature: &str, client_uuid: &str) -> Result<bool> {
        let Some(global) = self.global_setting(feature)? else {
            log::trace!(target: "feature_toggles", feature, client_uuid; "feature not found");
            return Ok(false);
        };
        if global.is_disabled_hard() {
            return Ok(false);
        }

        let mut client_setting = self.client_setting(client_uuid, &global)?;

        if global.is_enabled() {
            if let Some(percentage) = global.rollout_percentage() {
                client_setting =
                    self.apply_rollout(client_uuid, &global, percentage, client_setting)?;
            }
        }

        let enabled = decide(&global, client_setting.as_ref());
        log::trace!(target: "feature_toggles",
                    feature,
                    client_uuid,
                    global_status:display = global.status,
                    enabled;
                    "evaluated a feature");
        Ok(enabled)
    }

    /// Check whether `feature` is enabled for `client_uuid` without writing anything.
    ///
    /// Unlike [`Evaluator::enabled`], clients that haven't been assigned to a rollout yet are
    /// judged by the global status alone.
    pub fn can_use(&self, feature: &str, client_uuid: &str) -> bool {
        self.try_can_use(feature, client_uuid)
            .unwrap_or_else(|err| self.fallback(feature, client_uuid, &err))
    }

    /// Same as [`Evaluator::can_use`] but returns storage errors to the caller.
    pub fn try_can_use(&self, feature: &str, client_uuid: &str) -> Result<bool> {
        let Some(global) = self.global_setting(feature)? else {
            return Ok(false);
        };
        if global.is_disabled_hard() {
            return Ok(false);
        }

        let client_setting = self.client_setting(client_uuid, &global)?;
        Ok(decide(&global, client_setting.as_ref()))
    }

    /// Resolve configuration values for a client, preferring the client setting's extra data over
    /// the global setting's. Keys found in neither map to `None`.
    ///
    /// Independent of whether the feature is enabled.
    pub fn thresholds(
        &self,
        feature: &str,
        client_uuid: &str,
        keys: &[&str],
    ) -> Result<HashMap<String, Option<Value>>> {
        let mut result: HashMap<String, Option<Value>> =
            keys.iter().map(|key| ((*key).to_owned(), None)).collect();

        let Some(global) = self.global_setting(feature)? else {
            return Ok(result);
        };
        let client_setting = self.client_setting(client_uuid, &global)?;

        for key in keys {
            let value = client_setting
                .as_ref()
                .and_then(|cs| cs.extra(key))
                .or_else(|| global.extra(key));
            result.insert((*key).to_owned(), value.cloned());
        }

        Ok(result)
    }

    /// Drop everything cached in this session, so the next check reads fresh settings.
    pub fn refresh_session(&self) {
        self.cache.clear();
    }

    /// Administrative operations sharing this evaluator's repository and session cache.
    pub fn admin(&self) -> Admin {
        Admin::new(self.repository.clone(), self.cache.clone())
    }

    pub(crate) fn repository(&self) -> &dyn SettingsRepository {
        self.repository.as_ref()
    }

    fn fallback(&self, feature: &str, client_uuid: &str, err: &Error) -> bool {
        let fallback = self.config.failure_policy.fallback();
        log::warn!(target: "feature_toggles",
                   feature,
                   client_uuid,
                   fallback;
                   "error occurred while evaluating a feature: {:?}", err);
        fallback
    }

    fn global_setting(&self, feature: &str) -> Result<Option<GlobalSetting>> {
        let settings = match self.cache.global_settings() {
            Some(settings) => settings,
            None => {
                let settings = self.repository.all_global_settings()?;
                log::debug!(target: "feature_toggles",
                            count = settings.len();
                            "loaded global settings");
                self.cache.set_global_settings(settings)
            }
        };

        Ok(settings.iter().find(|gs| gs.has_name(feature)).cloned())
    }

    fn client_setting(
        &self,
        client_uuid: &str,
        global: &GlobalSetting,
    ) -> Result<Option<ClientSetting>> {
        let settings = match self.cache.client_settings(client_uuid) {
            Some(settings) => settings,
            None => {
                let settings = self.repository.all_client_settings_for(client_uuid)?;
                log::debug!(target: "feature_toggles",
                            client_uuid,
                            count = settings.len();
                            "loaded client settings");
                self.cache.set_client_settings(client_uuid, settings)
            }
        };

        Ok(settings
            .iter()
            .find(|cs| cs.global_setting_id == global.id)
            .cloned())
    }

    /// Persist the rollout decision for the client and return the client setting now in effect.
    fn apply_rollout(
        &self,
        client_uuid: &str,
        global: &GlobalSetting,
        percentage: i64,
        existing: Option<ClientSetting>,
    ) -> Result<Option<ClientSetting>> {
        let assignment = rollout::assign(
            &self.sharder,
            client_uuid,
            &global.name,
            percentage,
            existing.as_ref(),
        );
        let previous_percentage = existing
            .as_ref()
            .and_then(ClientSetting::assigned_by_percentage);

        let (outcome, action) = match assignment.action {
            RolloutAction::None => return Ok(existing),
            RolloutAction::Create { status, extra_data } => {
                let outcome = self.repository.create_client_setting(
                    global.id,
                    client_uuid,
                    status,
                    extra_data,
                )?;
                if outcome.is_uniqueness_violation() {
                    // Another evaluation created the row first; use theirs.
                    log::debug!(target: "feature_toggles",
                                feature:display = global.name,
                                client_uuid;
                                "rollout client setting created concurrently, re-fetching");
                    let current = self.repository.find_client_setting(client_uuid, global.id)?;
                    if let Some(setting) = &current {
                        self.cache.store_client_setting(setting);
                    }
                    return Ok(current);
                }
                (outcome, RolloutEventAction::Created)
            }
            RolloutAction::Update {
                id,
                status,
                extra_data,
            } => (
                self.repository
                    .update_client_setting(id, status, extra_data)?,
                RolloutEventAction::Updated,
            ),
        };

        match outcome {
            WriteOutcome::Persisted(setting) => {
                self.cache.store_client_setting(&setting);
                log::debug!(target: "feature_toggles",
                            feature:display = global.name,
                            client_uuid,
                            percentage,
                            bucketed = assignment.bucketed,
                            status:display = setting.status;
                            "persisted rollout assignment");
                let event = RolloutEvent {
                    feature: global.name.clone(),
                    client_uuid: client_uuid.to_owned(),
                    status: setting.status,
                    percentage,
                    previous_percentage,
                    action,
                    timestamp: Utc::now().to_rfc3339(),
                };
                log::trace!(target: "feature_toggles", event:serde; "logging rollout event");
                self.config.rollout_logger.log_rollout(event);
                Ok(Some(setting))
            }
            rejected @ WriteOutcome::Rejected(_) => {
                // A rejected write has no effect; decide against the row as it was.
                log::warn!(target: "feature_toggles",
                           feature:display = global.name,
                           client_uuid,
                           percentage;
                           "rollout assignment was rejected: {}",
                           rejected.error_messages().join(", "));
                Ok(existing)
            }
        }
    }
}

fn decide(global: &GlobalSetting, client_setting: Option<&ClientSetting>) -> bool {
    match client_setting {
        Some(cs) => cs.is_whitelisted(),
        None => global.is_enabled(),
    }
}
