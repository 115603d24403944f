use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::{ClientStatus, GlobalStatus};

/// Free-form key-value data attached to a setting.
pub type ExtraData = serde_json::Map<String, Value>;

/// Storage identifier of a setting row.
pub type SettingId = i64;

pub(crate) const ROLLOUT_PERCENTAGE: &str = "rollout_percentage";
pub(crate) const GENERATED_BY_ROLLOUT: &str = "generated_by_rollout";
pub(crate) const ASSIGNED_BY_PERCENTAGE: &str = "assigned_by_percentage";

/// Feature-wide configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSetting {
    pub id: SettingId,
    pub name: String,
    pub status: GlobalStatus,
    #[serde(default)]
    pub extra_data: Option<ExtraData>,
}

/// Per-client override of a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSetting {
    pub id: SettingId,
    pub client_uuid: String,
    pub global_setting_id: SettingId,
    pub status: ClientStatus,
    #[serde(default)]
    pub extra_data: Option<ExtraData>,
}

impl GlobalSetting {
    pub fn is_enabled(&self) -> bool {
        self.status == GlobalStatus::Enabled
    }

    pub fn is_disabled(&self) -> bool {
        self.status == GlobalStatus::Disabled
    }

    pub fn is_disabled_hard(&self) -> bool {
        self.status == GlobalStatus::DisabledHard
    }

    /// Configured staged rollout percentage, if any.
    ///
    /// Numeric strings are accepted since extra data is edited by hand.
    pub fn rollout_percentage(&self) -> Option<i64> {
        extra_value(&self.extra_data, ROLLOUT_PERCENTAGE).and_then(as_integer)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        extra_value(&self.extra_data, key)
    }

    /// Case-insensitive name comparison, matching the uniqueness rule for names.
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

impl ClientSetting {
    pub fn is_whitelisted(&self) -> bool {
        self.status == ClientStatus::Whitelisted
    }

    pub fn is_blacklisted(&self) -> bool {
        self.status == ClientStatus::Blacklisted
    }

    pub fn is_disabled_by_client(&self) -> bool {
        self.status == ClientStatus::DisabledByClient
    }

    /// Whether the row was materialized by the rollout assigner rather than an administrator.
    pub fn generated_by_rollout(&self) -> bool {
        match extra_value(&self.extra_data, GENERATED_BY_ROLLOUT) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    /// Rollout percentage in effect when the rollout assigner last wrote this row.
    pub fn assigned_by_percentage(&self) -> Option<i64> {
        extra_value(&self.extra_data, ASSIGNED_BY_PERCENTAGE).and_then(as_integer)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        extra_value(&self.extra_data, key)
    }
}

fn extra_value<'a>(extra_data: &'a Option<ExtraData>, key: &str) -> Option<&'a Value> {
    extra_data.as_ref()?.get(key)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn global(extra_data: Value) -> GlobalSetting {
        GlobalSetting {
            id: 1,
            name: "Search".to_owned(),
            status: GlobalStatus::Enabled,
            extra_data: extra_data.as_object().cloned(),
        }
    }

    fn client(extra_data: Value) -> ClientSetting {
        ClientSetting {
            id: 1,
            client_uuid: "u1".to_owned(),
            global_setting_id: 1,
            status: ClientStatus::Whitelisted,
            extra_data: extra_data.as_object().cloned(),
        }
    }

    #[test]
    fn reads_rollout_percentage() {
        assert_eq!(global(json!({"rollout_percentage": 40})).rollout_percentage(), Some(40));
        assert_eq!(global(json!({"rollout_percentage": "25"})).rollout_percentage(), Some(25));
        assert_eq!(global(json!({"rollout_percentage": "lots"})).rollout_percentage(), None);
        assert_eq!(global(Value::Null).rollout_percentage(), None);
    }

    #[test]
    fn reads_rollout_markers() {
        let cs = client(json!({"generated_by_rollout": true, "assigned_by_percentage": "30"}));
        assert!(cs.generated_by_rollout());
        assert_eq!(cs.assigned_by_percentage(), Some(30));

        let manual = client(json!({"note": "vip"}));
        assert!(!manual.generated_by_rollout());
        assert_eq!(manual.assigned_by_percentage(), None);
    }

    #[test]
    fn names_compare_case_insensitively() {
        let gs = global(Value::Null);
        assert!(gs.has_name("search"));
        assert!(gs.has_name("SEARCH"));
        assert!(!gs.has_name("searches"));
    }

    #[test]
    fn deserializes_without_extra_data() {
        let cs: ClientSetting = serde_json::from_value(json!({
            "id": 3,
            "clientUuid": "abc",
            "globalSettingId": 1,
            "status": "blacklisted"
        }))
        .unwrap();
        assert!(cs.is_blacklisted());
        assert_eq!(cs.extra_data, None);
    }
}
