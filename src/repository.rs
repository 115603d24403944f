//! Contract between the evaluator and the persistent settings store.
//!
//! Implementations validate writes before persisting them and report rejections as
//! [`WriteOutcome::Rejected`]. Transport failures are reported as [`Error::Storage`].
//!
//! [`Error::Storage`]: crate::Error::Storage
use std::fmt;

use serde_json::Value;

use crate::{
    settings::{ClientSetting, ExtraData, GlobalSetting, SettingId},
    status::{ClientStatus, GlobalStatus},
    Result,
};

/// Storage of global and client settings.
pub trait SettingsRepository: Send + Sync {
    /// Find a global setting by name. Names are matched case-insensitively.
    fn find_global_by_name(&self, name: &str) -> Result<Option<GlobalSetting>>;

    fn all_global_settings(&self) -> Result<Vec<GlobalSetting>>;

    fn find_client_setting(
        &self,
        client_uuid: &str,
        global_setting_id: SettingId,
    ) -> Result<Option<ClientSetting>>;

    fn all_client_settings_for(&self, client_uuid: &str) -> Result<Vec<ClientSetting>>;

    fn create_global_setting(
        &self,
        name: &str,
        status: GlobalStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<GlobalSetting>>;

    fn update_global_setting(
        &self,
        id: SettingId,
        status: GlobalStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<GlobalSetting>>;

    /// Delete a global setting together with all of its client settings.
    ///
    /// Returns `false` if there was nothing to delete.
    fn delete_global_setting(&self, id: SettingId) -> Result<bool>;

    fn create_client_setting(
        &self,
        global_setting_id: SettingId,
        client_uuid: &str,
        status: ClientStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<ClientSetting>>;

    fn update_client_setting(
        &self,
        id: SettingId,
        status: ClientStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<ClientSetting>>;

    /// Names of global settings with the given status.
    fn feature_names_with_status(&self, status: GlobalStatus) -> Result<Vec<String>>;

    /// Names of features for which the client has `client_status` and the feature itself has
    /// `global_status`.
    fn client_feature_names(
        &self,
        client_uuid: &str,
        client_status: ClientStatus,
        global_status: GlobalStatus,
    ) -> Result<Vec<String>>;
}

/// Result of a validated write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Persisted(T),
    Rejected(Vec<ValidationError>),
}

impl<T> WriteOutcome<T> {
    pub fn is_persisted(&self) -> bool {
        matches!(self, WriteOutcome::Persisted(_))
    }

    /// `true` if the write was rejected because the row already exists.
    pub fn is_uniqueness_violation(&self) -> bool {
        match self {
            WriteOutcome::Persisted(_) => false,
            WriteOutcome::Rejected(errors) => errors.iter().any(ValidationError::is_uniqueness),
        }
    }

    pub fn error_messages(&self) -> Vec<String> {
        match self {
            WriteOutcome::Persisted(_) => Vec::new(),
            WriteOutcome::Rejected(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Reason a repository refused a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    Blank(&'static str),
    /// A unique field (or field pair) is already taken.
    Taken(&'static str),
    /// A referenced row does not exist.
    MustExist(&'static str),
    /// The row being updated does not exist.
    NotFound(SettingId),
}

impl ValidationError {
    pub fn is_uniqueness(&self) -> bool {
        matches!(self, ValidationError::Taken(_))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Blank(field) => write!(f, "{field} can't be blank"),
            ValidationError::Taken(field) => write!(f, "{field} has already been taken"),
            ValidationError::MustExist(field) => write!(f, "{field} must exist"),
            ValidationError::NotFound(id) => write!(f, "Record {id} not found"),
        }
    }
}

/// Drop blank values from extra data before it is stored.
///
/// Returns `None` when nothing is left, since an empty mapping is never persisted.
pub fn filter_extra_data(extra_data: ExtraData) -> Option<ExtraData> {
    let filtered: ExtraData = extra_data
        .into_iter()
        .filter(|(_, value)| !is_blank(value))
        .collect();

    if filtered.is_empty() {
        None
    } else {
        Some(filtered)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(true) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn extra(value: Value) -> ExtraData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filters_blank_values() {
        let filtered = filter_extra_data(extra(json!({
            "threshold": 0,
            "label": "  ",
            "enabled": false,
            "tags": [],
            "nested": {},
            "missing": null,
            "flag": true,
        })))
        .unwrap();

        assert_eq!(
            Value::Object(filtered),
            json!({"threshold": 0, "flag": true})
        );
    }

    #[test]
    fn empty_after_filtering_becomes_none() {
        assert_eq!(filter_extra_data(ExtraData::new()), None);
        assert_eq!(filter_extra_data(extra(json!({"a": "", "b": null}))), None);
    }

    #[test]
    fn validation_messages() {
        assert_eq!(ValidationError::Blank("Name").to_string(), "Name can't be blank");
        assert_eq!(
            ValidationError::Taken("Client uuid").to_string(),
            "Client uuid has already been taken"
        );
        assert_eq!(
            ValidationError::MustExist("Global setting").to_string(),
            "Global setting must exist"
        );

        let outcome: WriteOutcome<()> = WriteOutcome::Rejected(vec![
            ValidationError::Blank("Client uuid"),
            ValidationError::Taken("Client uuid"),
        ]);
        assert!(outcome.is_uniqueness_violation());
        assert_eq!(outcome.error_messages().len(), 2);
    }
}
