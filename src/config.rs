use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    cache::SessionCache,
    repository::SettingsRepository,
    rollout_logger::{NoopRolloutLogger, RolloutLogger},
    Error, Evaluator,
};

/// What [`Evaluator::enabled`] answers when the settings storage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat the feature as disabled.
    #[default]
    Closed,
    /// Treat the feature as enabled.
    Open,
}

impl FailurePolicy {
    pub(crate) fn fallback(self) -> bool {
        match self {
            FailurePolicy::Closed => false,
            FailurePolicy::Open => true,
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(FailurePolicy::Closed),
            "open" => Ok(FailurePolicy::Open),
            _ => Err(Error::InvalidConfiguration(format!("unknown failure policy {s:?}"))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailurePolicy::Closed => "closed",
            FailurePolicy::Open => "open",
        })
    }
}

/// Configuration for [`Evaluator`].
///
/// # Examples
/// ```
/// # use std::sync::Arc;
/// # use feature_toggles::{
/// #     EvaluatorConfig, FailurePolicy, InMemoryRepository, RolloutEvent, SessionCache,
/// # };
/// let evaluator = EvaluatorConfig::new()
///     .failure_policy(FailurePolicy::Open)
///     .rollout_logger(|event: RolloutEvent| {
///         println!("{:?}", event);
///     })
///     .to_evaluator(Arc::new(InMemoryRepository::new()), Arc::new(SessionCache::new()));
/// ```
pub struct EvaluatorConfig<'a> {
    pub(crate) failure_policy: FailurePolicy,
    pub(crate) rollout_logger: Box<dyn RolloutLogger + Send + Sync + 'a>,
}

impl<'a> EvaluatorConfig<'a> {
    /// Default configuration: fail closed, discard rollout events.
    pub fn new() -> Self {
        EvaluatorConfig {
            failure_policy: FailurePolicy::default(),
            rollout_logger: Box::new(NoopRolloutLogger),
        }
    }

    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Set a logger that records every rollout-generated client setting write.
    pub fn rollout_logger(mut self, rollout_logger: impl RolloutLogger + Send + Sync + 'a) -> Self {
        self.rollout_logger = Box::new(rollout_logger);
        self
    }

    /// Create an [`Evaluator`] for one evaluation session.
    pub fn to_evaluator(
        self,
        repository: Arc<dyn SettingsRepository>,
        cache: Arc<SessionCache>,
    ) -> Evaluator<'a> {
        Evaluator::new(repository, cache, self)
    }
}

impl Default for EvaluatorConfig<'_> {
    fn default() -> Self {
        EvaluatorConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::FailurePolicy;

    #[test]
    fn parses_failure_policy() {
        assert_eq!("open".parse::<FailurePolicy>().unwrap(), FailurePolicy::Open);
        assert_eq!(" Closed ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Closed);
        assert!("maybe".parse::<FailurePolicy>().is_err());
        assert_eq!(
            serde_json::from_str::<FailurePolicy>("\"open\"").unwrap(),
            FailurePolicy::Open
        );
        assert_eq!(FailurePolicy::default(), FailurePolicy::Closed);
    }
}
