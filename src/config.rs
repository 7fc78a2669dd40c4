//! Session configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Hosts typically override only the notice texts (for localization) and
//! the startup permission set.

use crate::error::{DeviceError, Result};
use crate::types::PermissionKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a device session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub chat_app: ChatAppConfig,

    #[serde(default)]
    pub device_fields: DeviceFieldConfig,

    #[serde(default)]
    pub notices: NoticeConfig,

    #[serde(default)]
    pub blocking_prompt: BlockingPrompt,

    /// Kinds requested by `Device.RequestPermissions`
    #[serde(default = "default_startup_permissions")]
    pub startup_permissions: Vec<PermissionKind>,
}

fn default_startup_permissions() -> Vec<PermissionKind> {
    PermissionKind::ALL.to_vec()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            chat_app: ChatAppConfig::default(),
            device_fields: DeviceFieldConfig::default(),
            notices: NoticeConfig::default(),
            blocking_prompt: BlockingPrompt::default(),
            startup_permissions: default_startup_permissions(),
        }
    }
}

impl DeviceConfig {
    /// Parse a config from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DeviceError::Config(format!("Invalid config: {}", e)))
    }

    /// Load a config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DeviceError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "Device config loaded");
        Ok(config)
    }
}

/// Deep-link layout of the messaging app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAppConfig {
    /// URI scheme of the installed app (e.g., "whatsapp")
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host of the chat-open link
    #[serde(default = "default_send_host")]
    pub send_host: String,

    /// Host of the unofficial call link
    #[serde(default = "default_call_host")]
    pub call_host: String,

    /// Universal web link base, used when the app is absent
    #[serde(default = "default_web_base")]
    pub web_base: String,

    /// Field holding the app's contact identifier in picker results
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    /// Separator between the phone number and the rest of the identifier
    #[serde(default = "default_identifier_separator")]
    pub identifier_separator: char,
}

fn default_scheme() -> String {
    "whatsapp".to_string()
}

fn default_send_host() -> String {
    "send".to_string()
}

fn default_call_host() -> String {
    "call".to_string()
}

fn default_web_base() -> String {
    "https://wa.me".to_string()
}

fn default_identifier_field() -> String {
    "jid".to_string()
}

fn default_identifier_separator() -> char {
    '@'
}

impl Default for ChatAppConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            send_host: default_send_host(),
            call_host: default_call_host(),
            web_base: default_web_base(),
            identifier_field: default_identifier_field(),
            identifier_separator: default_identifier_separator(),
        }
    }
}

/// Field names of the device contact picker result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFieldConfig {
    #[serde(default = "default_number_field")]
    pub number: String,

    #[serde(default = "default_name_field")]
    pub display_name: String,
}

fn default_number_field() -> String {
    "number".to_string()
}

fn default_name_field() -> String {
    "display_name".to_string()
}

impl Default for DeviceFieldConfig {
    fn default() -> Self {
        Self {
            number: default_number_field(),
            display_name: default_name_field(),
        }
    }
}

/// Transient notice texts shown through the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeConfig {
    #[serde(default = "default_chat_app_missing")]
    pub chat_app_missing: String,

    #[serde(default = "default_contacts_required")]
    pub contacts_required: String,
}

fn default_chat_app_missing() -> String {
    "WhatsApp is not installed".to_string()
}

fn default_contacts_required() -> String {
    "Contacts access is required to pick a contact".to_string()
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            chat_app_missing: default_chat_app_missing(),
            contacts_required: default_contacts_required(),
        }
    }
}

/// The non-dismissible dialog shown when a startup permission is denied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingPrompt {
    #[serde(default = "default_prompt_title")]
    pub title: String,

    #[serde(default = "default_prompt_message")]
    pub message: String,

    #[serde(default = "default_retry_label")]
    pub retry_label: String,

    #[serde(default = "default_exit_label")]
    pub exit_label: String,
}

fn default_prompt_title() -> String {
    "Permissions required".to_string()
}

fn default_prompt_message() -> String {
    "This app needs phone and contacts access to work.".to_string()
}

fn default_retry_label() -> String {
    "Grant again".to_string()
}

fn default_exit_label() -> String {
    "Exit".to_string()
}

impl Default for BlockingPrompt {
    fn default() -> Self {
        Self {
            title: default_prompt_title(),
            message: default_prompt_message(),
            retry_label: default_retry_label(),
            exit_label: default_exit_label(),
        }
    }
}
