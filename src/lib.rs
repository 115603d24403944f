//! Feature toggle evaluation with per-client overrides and staged percentage rollouts.
//!
//! # Overview
//!
//! Every feature has a global setting with one of three statuses: `enabled`, `disabled` (off by
//! default, clients may be whitelisted) or `disabled_hard` (off for everyone). Clients may carry
//! an override per feature: `whitelisted`, `blacklisted` or `disabled_by_client`.
//!
//! The [`Evaluator`] answers "is feature F enabled for client C". It reads settings through a
//! [`SettingsRepository`] and memoizes lookups in a [`SessionCache`] for the duration of one
//! evaluation session.
//!
//! # Staged rollouts
//!
//! An enabled feature whose extra data holds `rollout_percentage` is released to that share of
//! clients. Each client is bucketed deterministically by hashing its uuid together with the
//! feature name, and the decision is stored as a client setting so it stays stable when the
//! percentage later moves. See [`rollout::assign`] for the retention rules.
//!
//! ```
//! # use std::sync::Arc;
//! # use feature_toggles::{EvaluatorConfig, InMemoryRepository, SessionCache};
//! let evaluator = EvaluatorConfig::new()
//!     .to_evaluator(Arc::new(InMemoryRepository::new()), Arc::new(SessionCache::new()));
//!
//! let extra_data = serde_json::json!({ "rollout_percentage": 25 });
//! evaluator
//!     .admin()
//!     .enable_global("new_checkout", extra_data.as_object().cloned().unwrap_or_default())
//!     .unwrap();
//!
//! let first = evaluator.enabled("new_checkout", "4b5f0c1e-client");
//! assert_eq!(evaluator.enabled("new_checkout", "4b5f0c1e-client"), first);
//! ```
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! [`Evaluator::enabled`] and [`Evaluator::can_use`] never fail: storage errors are logged and
//! resolved with the configured [`FailurePolicy`] (closed by default). Use
//! [`Evaluator::try_enabled`] to handle errors yourself.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with target
//! `feature_toggles` and structured key-values. Consider integrating a `log`-compatible logger
//! implementation for better visibility into evaluation.

#![warn(rustdoc::missing_crate_level_docs)]

mod admin;
mod cache;
mod config;
mod error;
mod evaluator;
mod memory_repository;
mod query;
pub mod repository;
pub mod rollout;
mod rollout_logger;
mod settings;
pub mod sharder;
pub mod status;

pub use admin::{Admin, MutationResult};
pub use cache::SessionCache;
pub use config::{EvaluatorConfig, FailurePolicy};
pub use error::{Error, Result};
pub use evaluator::Evaluator;
pub use memory_repository::{InMemoryRepository, SettingsDocument};
pub use repository::{SettingsRepository, ValidationError, WriteOutcome};
pub use rollout_logger::{RolloutEvent, RolloutEventAction, RolloutLogger};
pub use settings::{ClientSetting, ExtraData, GlobalSetting, SettingId};
pub use status::{ClientStatus, GlobalStatus};
