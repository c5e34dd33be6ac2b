//! GitHub REST API DTOs
//!
//! Only the fields the controller reads or writes are modelled.

use serde::{Deserialize, Serialize};

/// Content type the managed webhooks deliver
pub const HOOK_CONTENT_TYPE: &str = "json";

/// `insecure_ssl` value enabling TLS verification
pub const HOOK_VERIFY_TLS: &str = "0";

/// Repository webhook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub config: HookConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub insecure_ssl: String,
    /// Write-only; GitHub never returns the secret of an existing hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Hook {
    /// Active JSON hook with TLS verification delivering `events` to `url`
    pub fn desired(url: impl Into<String>, events: Vec<String>, secret: Option<String>) -> Self {
        Self {
            id: None,
            active: true,
            events,
            config: HookConfig {
                url: url.into(),
                content_type: HOOK_CONTENT_TYPE.to_string(),
                insecure_ssl: HOOK_VERIFY_TLS.to_string(),
                secret,
            },
        }
    }

    /// Whether this hook's settings diverge from `desired`
    ///
    /// Compares the active flag, event list, URL, content type and TLS flag.
    pub fn diverges_from(&self, desired: &Hook) -> bool {
        !self.active
            || self.events != desired.events
            || self.config.url != desired.config.url
            || self.config.content_type != HOOK_CONTENT_TYPE
            || self.config.insecure_ssl != HOOK_VERIFY_TLS
    }
}

/// Repository deploy key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Repository metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub private: bool,
}
