//! In-process [`SettingsRepository`] backed by two id-ordered tables.
use std::{
    collections::BTreeMap,
    io::Read,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use serde::{Deserialize, Serialize};

use crate::{
    repository::{filter_extra_data, SettingsRepository, ValidationError, WriteOutcome},
    settings::{names_match, ClientSetting, ExtraData, GlobalSetting, SettingId},
    status::{ClientStatus, GlobalStatus},
    Error, Result,
};

/// Serialized form of the two settings tables, used for seeding.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default)]
    pub global_settings: Vec<GlobalSetting>,
    #[serde(default)]
    pub client_settings: Vec<ClientSetting>,
}

#[derive(Default)]
struct Tables {
    global: BTreeMap<SettingId, GlobalSetting>,
    client: BTreeMap<SettingId, ClientSetting>,
    next_id: SettingId,
}

impl Tables {
    fn allocate_id(&mut self) -> SettingId {
        self.next_id += 1;
        self.next_id
    }

    fn global_name_taken(&self, name: &str, except: Option<SettingId>) -> bool {
        self.global
            .values()
            .any(|gs| Some(gs.id) != except && gs.has_name(name))
    }

    fn client_pair_taken(&self, client_uuid: &str, global_setting_id: SettingId) -> bool {
        self.client.values().any(|cs| {
            cs.global_setting_id == global_setting_id && names_match(&cs.client_uuid, client_uuid)
        })
    }
}

/// Thread-safe in-memory settings store.
///
/// Enforces the same validation rules as a database-backed store would, including the
/// uniqueness of (client, feature) pairs, so concurrent rollout writers observe a rejected
/// create rather than a duplicate row.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        InMemoryRepository::default()
    }

    /// Build a repository seeded from a [`SettingsDocument`].
    pub fn from_document(document: SettingsDocument) -> Self {
        let next_id = document
            .global_settings
            .iter()
            .map(|gs| gs.id)
            .chain(document.client_settings.iter().map(|cs| cs.id))
            .max()
            .unwrap_or(0);

        let tables = Tables {
            global: document
                .global_settings
                .into_iter()
                .map(|gs| (gs.id, gs))
                .collect(),
            client: document
                .client_settings
                .into_iter()
                .map(|cs| (cs.id, cs))
                .collect(),
            next_id,
        };

        InMemoryRepository {
            tables: Mutex::new(tables),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Build a repository seeded from a JSON [`SettingsDocument`].
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let document: SettingsDocument = serde_json::from_reader(reader)?;
        Ok(Self::from_document(document))
    }

    /// Snapshot current contents.
    pub fn to_document(&self) -> Result<SettingsDocument> {
        let tables = self.tables()?;
        Ok(SettingsDocument {
            global_settings: tables.global.values().cloned().collect(),
            client_settings: tables.client.values().cloned().collect(),
        })
    }

    /// Simulate a storage outage. While unavailable every call fails with [`Error::Storage`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "settings storage is unavailable",
            )));
        }

        Ok(self
            .tables
            .lock()
            .expect("thread holding settings lock should not panic"))
    }
}

impl SettingsRepository for InMemoryRepository {
    fn find_global_by_name(&self, name: &str) -> Result<Option<GlobalSetting>> {
        let tables = self.tables()?;
        Ok(tables.global.values().find(|gs| gs.has_name(name)).cloned())
    }

    fn all_global_settings(&self) -> Result<Vec<GlobalSetting>> {
        let tables = self.tables()?;
        Ok(tables.global.values().cloned().collect())
    }

    fn find_client_setting(
        &self,
        client_uuid: &str,
        global_setting_id: SettingId,
    ) -> Result<Option<ClientSetting>> {
        let tables = self.tables()?;
        Ok(tables
            .client
            .values()
            .find(|cs| {
                cs.global_setting_id == global_setting_id
                    && names_match(&cs.client_uuid, client_uuid)
            })
            .cloned())
    }

    fn all_client_settings_for(&self, client_uuid: &str) -> Result<Vec<ClientSetting>> {
        let tables = self.tables()?;
        Ok(tables
            .client
            .values()
            .filter(|cs| names_match(&cs.client_uuid, client_uuid))
            .cloned()
            .collect())
    }

    fn create_global_setting(
        &self,
        name: &str,
        status: GlobalStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<GlobalSetting>> {
        let mut tables = self.tables()?;

        let mut errors = Vec::new();
        if name.trim().is_empty() {
            errors.push(ValidationError::Blank("Name"));
        } else if tables.global_name_taken(name, None) {
            errors.push(ValidationError::Taken("Name"));
        }
        if !errors.is_empty() {
            return Ok(WriteOutcome::Rejected(errors));
        }

        let setting = GlobalSetting {
            id: tables.allocate_id(),
            name: name.to_owned(),
            status,
            extra_data: filter_extra_data(extra_data),
        };
        tables.global.insert(setting.id, setting.clone());
        Ok(WriteOutcome::Persisted(setting))
    }

    fn update_global_setting(
        &self,
        id: SettingId,
        status: GlobalStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<GlobalSetting>> {
        let mut tables = self.tables()?;
        let Some(setting) = tables.global.get_mut(&id) else {
            return Ok(WriteOutcome::Rejected(vec![ValidationError::NotFound(id)]));
        };

        setting.status = status;
        setting.extra_data = filter_extra_data(extra_data);
        Ok(WriteOutcome::Persisted(setting.clone()))
    }

    fn delete_global_setting(&self, id: SettingId) -> Result<bool> {
        let mut tables = self.tables()?;
        if tables.global.remove(&id).is_none() {
            return Ok(false);
        }
        tables.client.retain(|_, cs| cs.global_setting_id != id);
        Ok(true)
    }

    fn create_client_setting(
        &self,
        global_setting_id: SettingId,
        client_uuid: &str,
        status: ClientStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<ClientSetting>> {
        let mut tables = self.tables()?;

        let mut errors = Vec::new();
        if client_uuid.trim().is_empty() {
            errors.push(ValidationError::Blank("Client uuid"));
        }
        if !tables.global.contains_key(&global_setting_id) {
            errors.push(ValidationError::MustExist("Global setting"));
        } else if tables.client_pair_taken(client_uuid, global_setting_id) {
            errors.push(ValidationError::Taken("Client uuid"));
        }
        if !errors.is_empty() {
            return Ok(WriteOutcome::Rejected(errors));
        }

        let setting = ClientSetting {
            id: tables.allocate_id(),
            client_uuid: client_uuid.to_owned(),
            global_setting_id,
            status,
            extra_data: filter_extra_data(extra_data),
        };
        tables.client.insert(setting.id, setting.clone());
        Ok(WriteOutcome::Persisted(setting))
    }

    fn update_client_setting(
        &self,
        id: SettingId,
        status: ClientStatus,
        extra_data: ExtraData,
    ) -> Result<WriteOutcome<ClientSetting>> {
        let mut tables = self.tables()?;
        let Some(setting) = tables.client.get_mut(&id) else {
            return Ok(WriteOutcome::Rejected(vec![ValidationError::NotFound(id)]));
        };

        setting.status = status;
        setting.extra_data = filter_extra_data(extra_data);
        Ok(WriteOutcome::Persisted(setting.clone()))
    }

    fn feature_names_with_status(&self, status: GlobalStatus) -> Result<Vec<String>> {
        let tables = self.tables()?;
        Ok(tables
            .global
            .values()
            .filter(|gs| gs.status == status)
            .map(|gs| gs.name.clone())
            .collect())
    }

    fn client_feature_names(
        &self,
        client_uuid: &str,
        client_status: ClientStatus,
        global_status: GlobalStatus,
    ) -> Result<Vec<String>> {
        let tables = self.tables()?;
        Ok(tables
            .client
            .values()
            .filter(|cs| cs.status == client_status && names_match(&cs.client_uuid, client_uuid))
            .filter_map(|cs| tables.global.get(&cs.global_setting_id))
            .filter(|gs| gs.status == global_status)
            .map(|gs| gs.name.clone())
            .collect())
    }
}
