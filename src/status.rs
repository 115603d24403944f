//! Registry of global and per-client statuses.
//!
//! Integer codes are part of the persisted shape and must stay stable.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Feature-wide status stored on a global setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalStatus {
    /// Off by default, but clients may be whitelisted.
    Disabled,
    /// Off for everyone, client overrides are ignored.
    DisabledHard,
    /// On for everyone without an override.
    Enabled,
}

/// Per-client override status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Whitelisted,
    Blacklisted,
    DisabledByClient,
}

impl GlobalStatus {
    /// All global statuses, in code order.
    pub const ALL: [GlobalStatus; 3] = [
        GlobalStatus::Disabled,
        GlobalStatus::DisabledHard,
        GlobalStatus::Enabled,
    ];

    pub fn code(self) -> i32 {
        match self {
            GlobalStatus::Disabled => 1,
            GlobalStatus::DisabledHard => 2,
            GlobalStatus::Enabled => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            GlobalStatus::Disabled => "disabled",
            GlobalStatus::DisabledHard => "disabled_hard",
            GlobalStatus::Enabled => "enabled",
        }
    }

    /// Name of the administrative verb that sets this status.
    pub fn verb(self) -> &'static str {
        match self {
            GlobalStatus::Disabled => "disable",
            GlobalStatus::DisabledHard => "disable_hard",
            GlobalStatus::Enabled => "enable",
        }
    }

    pub fn from_verb(verb: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.verb() == verb)
            .ok_or_else(|| Error::InvalidStatus(verb.to_owned()))
    }
}

impl ClientStatus {
    /// All client statuses, in code order.
    pub const ALL: [ClientStatus; 3] = [
        ClientStatus::Whitelisted,
        ClientStatus::Blacklisted,
        ClientStatus::DisabledByClient,
    ];

    pub fn code(self) -> i32 {
        match self {
            ClientStatus::Whitelisted => 1,
            ClientStatus::Blacklisted => 2,
            ClientStatus::DisabledByClient => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ClientStatus::Whitelisted => "whitelisted",
            ClientStatus::Blacklisted => "blacklisted",
            ClientStatus::DisabledByClient => "disabled_by_client",
        }
    }

    /// Name of the administrative verb that sets this status.
    pub fn verb(self) -> &'static str {
        match self {
            ClientStatus::Whitelisted => "whitelist",
            ClientStatus::Blacklisted => "blacklist",
            ClientStatus::DisabledByClient => "disable_by_client",
        }
    }

    pub fn from_verb(verb: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.verb() == verb)
            .ok_or_else(|| Error::InvalidStatus(verb.to_owned()))
    }

    /// Rollout bucket decision mapped onto a client status.
    pub fn from_rollout(whitelisted: bool) -> Self {
        if whitelisted {
            ClientStatus::Whitelisted
        } else {
            ClientStatus::Blacklisted
        }
    }
}

impl FromStr for GlobalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_owned()))
    }
}

impl FromStr for ClientStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| Error::InvalidStatus(s.to_owned()))
    }
}

impl fmt::Display for GlobalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a global status name to its stored code.
pub fn global_status_value(name: &str) -> Result<i32> {
    name.parse::<GlobalStatus>().map(GlobalStatus::code)
}

/// Resolve a client status name to its stored code.
pub fn client_status_value(name: &str) -> Result<i32> {
    name.parse::<ClientStatus>().map(ClientStatus::code)
}
