//! Administrative mutations of global and client settings.
//!
//! Every status in the registry has one verb-shaped operation (`enable_global`,
//! `whitelist_client`, ...). Status and verb names are resolved through the registry before any
//! lookup, so an unknown name fails with [`Error::InvalidStatus`] and writes nothing. Successful
//! writes clear the shared [`SessionCache`].
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::Error;
use crate::{
    cache::SessionCache,
    repository::{SettingsRepository, ValidationError, WriteOutcome},
    settings::ExtraData,
    status::{ClientStatus, GlobalStatus},
    Result,
};

/// Outcome of an administrative write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub success: bool,
    pub errors: Vec<String>,
}

impl MutationResult {
    fn failure(errors: Vec<String>) -> Self {
        MutationResult {
            success: false,
            errors,
        }
    }
}

impl<T> From<&WriteOutcome<T>> for MutationResult {
    fn from(outcome: &WriteOutcome<T>) -> Self {
        MutationResult {
            success: outcome.is_persisted(),
            errors: outcome.error_messages(),
        }
    }
}

/// Writes settings through the repository and invalidates the session cache.
#[derive(Clone)]
pub struct Admin {
    repository: Arc<dyn SettingsRepository>,
    cache: Arc<SessionCache>,
}

impl Admin {
    pub fn new(repository: Arc<dyn SettingsRepository>, cache: Arc<SessionCache>) -> Self {
        Admin { repository, cache }
    }

    /// Create or update the global setting of `feature` with the status named `status_name`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidStatus`] if `status_name` is not a global status.
    /// - [`Error::Storage`] if the repository fails.
    ///
    /// Validation failures are reported through [`MutationResult`].
    pub fn set_global_status(
        &self,
        feature: &str,
        status_name: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        let status: GlobalStatus = status_name.parse()?;
        self.write_global(feature, status, extra_data)
    }

    /// Create or update the client setting of `client_uuid` for `feature` with the status named
    /// `status_name`. The feature must already have a global setting.
    pub fn set_client_status(
        &self,
        feature: &str,
        client_uuid: &str,
        status_name: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        let status: ClientStatus = status_name.parse()?;
        self.write_client(feature, client_uuid, status, extra_data)
    }

    /// Dispatch a global verb (`enable`, `disable`, `disable_hard`).
    pub fn apply_global_verb(
        &self,
        verb: &str,
        feature: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        let status = GlobalStatus::from_verb(verb)?;
        self.write_global(feature, status, extra_data)
    }

    /// Dispatch a client verb (`whitelist`, `blacklist`, `disable_by_client`).
    pub fn apply_client_verb(
        &self,
        verb: &str,
        feature: &str,
        client_uuid: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        let status = ClientStatus::from_verb(verb)?;
        self.write_client(feature, client_uuid, status, extra_data)
    }

    pub fn enable_global(&self, feature: &str, extra_data: ExtraData) -> Result<MutationResult> {
        self.write_global(feature, GlobalStatus::Enabled, extra_data)
    }

    pub fn disable_global(&self, feature: &str, extra_data: ExtraData) -> Result<MutationResult> {
        self.write_global(feature, GlobalStatus::Disabled, extra_data)
    }

    pub fn disable_hard_global(
        &self,
        feature: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        self.write_global(feature, GlobalStatus::DisabledHard, extra_data)
    }

    pub fn whitelist_client(
        &self,
        feature: &str,
        client_uuid: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        self.write_client(feature, client_uuid, ClientStatus::Whitelisted, extra_data)
    }

    pub fn blacklist_client(
        &self,
        feature: &str,
        client_uuid: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        self.write_client(feature, client_uuid, ClientStatus::Blacklisted, extra_data)
    }

    pub fn disable_by_client(
        &self,
        feature: &str,
        client_uuid: &str,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        self.write_client(feature, client_uuid, ClientStatus::DisabledByClient, extra_data)
    }

    /// Delete the global setting of `feature` and every client setting referencing it.
    ///
    /// Returns `false` if the feature doesn't exist.
    pub fn delete_global(&self, feature: &str) -> Result<bool> {
        let Some(global) = self.repository.find_global_by_name(feature)? else {
            return Ok(false);
        };

        let deleted = self.repository.delete_global_setting(global.id)?;
        if deleted {
            log::debug!(target: "feature_toggles", feature; "deleted global setting");
            self.cache.clear();
        }
        Ok(deleted)
    }

    fn write_global(
        &self,
        feature: &str,
        status: GlobalStatus,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        let outcome = match self.repository.find_global_by_name(feature)? {
            Some(global) => self
                .repository
                .update_global_setting(global.id, status, extra_data)?,
            None => self
                .repository
                .create_global_setting(feature, status, extra_data)?,
        };

        Ok(self.finish(&outcome, feature, status.name()))
    }

    fn write_client(
        &self,
        feature: &str,
        client_uuid: &str,
        status: ClientStatus,
        extra_data: ExtraData,
    ) -> Result<MutationResult> {
        let Some(global) = self.repository.find_global_by_name(feature)? else {
            return Ok(MutationResult::failure(vec![
                ValidationError::MustExist("Global setting").to_string()
            ]));
        };

        let outcome = match self.repository.find_client_setting(client_uuid, global.id)? {
            Some(existing) => self
                .repository
                .update_client_setting(existing.id, status, extra_data)?,
            None => self.repository.create_client_setting(
                global.id,
                client_uuid,
                status,
                extra_data,
            )?,
        };

        Ok(self.finish(&outcome, feature, status.name()))
    }

    fn finish<T>(&self, outcome: &WriteOutcome<T>, feature: &str, status: &str) -> MutationResult {
        let result = MutationResult::from(outcome);
        if result.success {
            log::debug!(target: "feature_toggles", feature, status; "updated setting");
            self.cache.clear();
        } else {
            log::debug!(target: "feature_toggles",
                        feature,
                        status;
                        "setting write rejected: {}", result.errors.join(", "));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{memory_repository::InMemoryRepository, EvaluatorConfig, Error};

    fn extra(value: serde_json::Value) -> ExtraData {
        value.as_object().cloned().unwrap_or_default()
    }

    fn setup() -> (Arc<InMemoryRepository>, crate::Evaluator<'static>) {
        let repository = Arc::new(InMemoryRepository::new());
        let evaluator = EvaluatorConfig::new()
            .to_evaluator(repository.clone(), Arc::new(SessionCache::new()));
        (repository, evaluator)
    }

    #[test]
    fn enable_global_creates_then_updates() {
        let (repository, evaluator) = setup();
        let admin = evaluator.admin();

        assert!(!evaluator.enabled("foobar", "123"));
        let result = admin.enable_global("foobar", ExtraData::new()).unwrap();
        assert!(result.success);
        assert!(evaluator.enabled("foobar", "123"));

        let result = admin
            .disable_global("foobar", extra(json!({"custom_data": "value"})))
            .unwrap();
        assert!(result.success);
        assert!(!evaluator.enabled("foobar", "123"));

        let stored = repository.find_global_by_name("foobar").unwrap().unwrap();
        assert_eq!(stored.extra("custom_data"), Some(&json!("value")));
        assert_eq!(repository.all_global_settings().unwrap().len(), 1);
    }

    #[test]
    fn disable_hard_overrides_whitelist() {
        let (_, evaluator) = setup();
        let admin = evaluator.admin();

        admin.disable_global("foobar", ExtraData::new()).unwrap();
        admin
            .whitelist_client("foobar", "123", ExtraData::new())
            .unwrap();
        assert!(evaluator.enabled("foobar", "123"));

        assert!(admin
            .disable_hard_global("foobar", ExtraData::new())
            .unwrap()
            .success);
        assert!(!evaluator.enabled("foobar", "123"));
    }

    #[test]
    fn client_verbs_create_and_update() {
        let (repository, evaluator) = setup();
        let admin = evaluator.admin();
        admin.enable_global("main_feature", ExtraData::new()).unwrap();

        assert!(evaluator.enabled("main_feature", "123"));
        assert!(admin
            .blacklist_client("main_feature", "123", ExtraData::new())
            .unwrap()
            .success);
        assert!(!evaluator.enabled("main_feature", "123"));

        assert!(admin
            .whitelist_client("main_feature", "123", extra(json!({"custom_data": "value"})))
            .unwrap()
            .success);
        assert!(evaluator.enabled("main_feature", "123"));

        assert!(admin
            .disable_by_client("main_feature", "123", ExtraData::new())
            .unwrap()
            .success);
        assert!(!evaluator.enabled("main_feature", "123"));

        let rows = repository.all_client_settings_for("123").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_disabled_by_client());
        assert_eq!(rows[0].extra_data, None);
    }

    #[test]
    fn status_names_are_validated_before_writing() {
        let (repository, evaluator) = setup();
        let admin = evaluator.admin();

        assert!(matches!(
            admin.set_global_status("foobar", "whitelisted", ExtraData::new()),
            Err(Error::InvalidStatus(name)) if name == "whitelisted"
        ));
        assert!(matches!(
            admin.apply_client_verb("enable", "foobar", "123", ExtraData::new()),
            Err(Error::InvalidStatus(_))
        ));
        assert!(repository.all_global_settings().unwrap().is_empty());

        assert!(admin
            .set_global_status("foobar", "enabled", ExtraData::new())
            .unwrap()
            .success);
        assert!(admin
            .set_client_status("foobar", "123", "blacklisted", ExtraData::new())
            .unwrap()
            .success);
        assert!(admin
            .apply_global_verb("disable_hard", "foobar", ExtraData::new())
            .unwrap()
            .success);
        assert!(!evaluator.enabled("foobar", "123"));
    }

    #[test]
    fn client_write_requires_global_setting() {
        let (repository, evaluator) = setup();
        let result = evaluator
            .admin()
            .whitelist_client("missing", "123", ExtraData::new())
            .unwrap();

        assert_eq!(
            result,
            MutationResult {
                success: false,
                errors: vec!["Global setting must exist".to_owned()],
            }
        );
        assert!(repository.all_client_settings_for("123").unwrap().is_empty());
    }

    #[test]
    fn rejected_global_write_reports_errors() {
        let (_, evaluator) = setup();
        let result = evaluator
            .admin()
            .enable_global(" ", ExtraData::new())
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Name can't be blank"]);
    }

    #[test]
    fn delete_global_cascades_and_invalidates() {
        let (repository, evaluator) = setup();
        let admin = evaluator.admin();
        admin.disable_global("foobar", ExtraData::new()).unwrap();
        admin
            .whitelist_client("foobar", "123", ExtraData::new())
            .unwrap();
        assert!(evaluator.enabled("foobar", "123"));

        assert!(admin.delete_global("foobar").unwrap());
        assert!(!evaluator.enabled("foobar", "123"));
        assert!(repository.all_client_settings_for("123").unwrap().is_empty());
        assert!(!admin.delete_global("foobar").unwrap());
    }
}
