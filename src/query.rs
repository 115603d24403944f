//! Aggregate lookups. These go straight to the repository and bypass the session cache.
use crate::{
    status::{ClientStatus, GlobalStatus},
    Evaluator, Result,
};

impl Evaluator<'_> {
    /// Names of all features that have a global setting.
    pub fn all_feature_names(&self) -> Result<Vec<String>> {
        Ok(self
            .repository()
            .all_global_settings()?
            .into_iter()
            .map(|gs| gs.name)
            .collect())
    }

    pub fn feature_names_with_status(&self, status: GlobalStatus) -> Result<Vec<String>> {
        self.repository().feature_names_with_status(status)
    }

    pub fn enabled_feature_names(&self) -> Result<Vec<String>> {
        self.feature_names_with_status(GlobalStatus::Enabled)
    }

    pub fn disabled_feature_names(&self) -> Result<Vec<String>> {
        self.feature_names_with_status(GlobalStatus::Disabled)
    }

    pub fn disabled_hard_feature_names(&self) -> Result<Vec<String>> {
        self.feature_names_with_status(GlobalStatus::DisabledHard)
    }

    /// Names of globally enabled features for which the client has the given status.
    pub fn client_feature_names(
        &self,
        client_uuid: &str,
        status: ClientStatus,
    ) -> Result<Vec<String>> {
        self.repository()
            .client_feature_names(client_uuid, status, GlobalStatus::Enabled)
    }

    pub fn whitelisted_feature_names(&self, client_uuid: &str) -> Result<Vec<String>> {
        self.client_feature_names(client_uuid, ClientStatus::Whitelisted)
    }

    pub fn blacklisted_feature_names(&self, client_uuid: &str) -> Result<Vec<String>> {
        self.client_feature_names(client_uuid, ClientStatus::Blacklisted)
    }

    pub fn disabled_by_client_feature_names(&self, client_uuid: &str) -> Result<Vec<String>> {
        self.client_feature_names(client_uuid, ClientStatus::DisabledByClient)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, sync::Arc};

    use crate::{
        memory_repository::InMemoryRepository, repository::SettingsRepository,
        settings::ExtraData, status::GlobalStatus, Evaluator, EvaluatorConfig, SessionCache,
    };

    fn setup() -> (Arc<InMemoryRepository>, Evaluator<'static>) {
        let repository = Arc::new(
            InMemoryRepository::from_reader(File::open("tests/data/settings.json").unwrap())
                .unwrap(),
        );
        let evaluator = EvaluatorConfig::new()
            .to_evaluator(repository.clone(), Arc::new(SessionCache::new()));
        (repository, evaluator)
    }

    fn evaluator() -> Evaluator<'static> {
        setup().1
    }

    #[test]
    fn lists_features_by_global_status() {
        let evaluator = evaluator();

        assert_eq!(
            evaluator.all_feature_names().unwrap(),
            vec!["search", "beta_editor", "legacy_export", "new_checkout"]
        );
        assert_eq!(
            evaluator.enabled_feature_names().unwrap(),
            vec!["search", "new_checkout"]
        );
        assert_eq!(evaluator.disabled_feature_names().unwrap(), vec!["beta_editor"]);
        assert_eq!(
            evaluator.disabled_hard_feature_names().unwrap(),
            vec!["legacy_export"]
        );
    }

    #[test]
    fn lists_client_features_joined_with_enabled() {
        let evaluator = evaluator();

        // beta_editor is whitelisted too, but not globally enabled
        assert_eq!(
            evaluator.whitelisted_feature_names("client-a").unwrap(),
            vec!["search"]
        );
        assert_eq!(
            evaluator.blacklisted_feature_names("client-b").unwrap(),
            vec!["search"]
        );
        assert_eq!(
            evaluator.disabled_by_client_feature_names("client-c").unwrap(),
            vec!["search"]
        );
        assert!(evaluator
            .whitelisted_feature_names("client-z")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn queries_bypass_session_cache() {
        let (repository, evaluator) = setup();
        assert!(evaluator.enabled("search", "client-z"));

        // written behind the evaluator's back, so the session cache is stale
        assert!(repository
            .create_global_setting("dark_mode", GlobalStatus::Enabled, ExtraData::new())
            .unwrap()
            .is_persisted());

        assert!(!evaluator.enabled("dark_mode", "client-z"));
        assert_eq!(evaluator.enabled_feature_names().unwrap().len(), 3);
    }
}
