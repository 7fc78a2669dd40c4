//! Core request, permission, contact and event types
//!
//! All wire types use camelCase JSON serialization to match the host bridge.

use crate::error::{DeviceError, ErrorKind, Result};
use crate::phone;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw request parameters as received from the host bridge
pub type Params = serde_json::Map<String, serde_json::Value>;

/// The set of actions the bridge understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    OpenDialer,
    OpenSms,
    OpenChat,
    PickContact,
    RequestPermissions,
}

impl ActionKind {
    /// All action kinds, in dispatch-table order
    pub const ALL: [ActionKind; 5] = [
        ActionKind::OpenDialer,
        ActionKind::OpenSms,
        ActionKind::OpenChat,
        ActionKind::PickContact,
        ActionKind::RequestPermissions,
    ];

    /// Bridge method name for this action (e.g., "Device.OpenDialer")
    pub fn method(&self) -> &'static str {
        match self {
            ActionKind::OpenDialer => "Device.OpenDialer",
            ActionKind::OpenSms => "Device.OpenSms",
            ActionKind::OpenChat => "Device.OpenWhatsApp",
            ActionKind::PickContact => "Device.PickContact",
            ActionKind::RequestPermissions => "Device.RequestPermissions",
        }
    }

    /// Resolve a bridge method name
    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.method() == method)
    }
}

/// A request to perform a device action
///
/// Immutable once dispatched: handlers only ever see the typed parameter
/// structs parsed out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub kind: ActionKind,
    #[serde(default)]
    pub params: Params,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, params: Params) -> Self {
        Self { kind, params }
    }

    /// Build a request from a bridge method name and a JSON params value
    ///
    /// `null` params are treated as an empty map; anything other than an
    /// object is rejected.
    pub fn from_call(method: &str, params: serde_json::Value) -> Result<Self> {
        let kind = ActionKind::from_method(method)
            .ok_or_else(|| DeviceError::UnknownMethod(method.to_string()))?;
        let params = match params {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => Params::new(),
            other => {
                return Err(DeviceError::InvalidParameters(format!(
                    "Parameters must be an object, got {}",
                    other
                )))
            }
        };
        Ok(Self { kind, params })
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        match self.params.get(key) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => Err(
                DeviceError::InvalidParameters(format!("'{}' is required", key)),
            ),
            Some(_) => Err(DeviceError::InvalidParameters(format!(
                "'{}' must be a string",
                key
            ))),
        }
    }

    fn optional_str(&self, key: &str) -> Result<Option<&str>> {
        match self.params.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(DeviceError::InvalidParameters(format!(
                "'{}' must be a string",
                key
            ))),
        }
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.params.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(DeviceError::InvalidParameters(format!(
                "'{}' must be a boolean",
                key
            ))),
        }
    }
}

/// Parameters of [`ActionKind::OpenDialer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialParams {
    /// Number as given by the caller; passed to the call UI un-mangled
    pub phone: String,
    /// Canonical form, used for logging
    pub normalized: String,
    pub auto_call: bool,
}

impl DialParams {
    pub fn from_request(request: &ActionRequest) -> Result<Self> {
        let phone = request.required_str("phone")?;
        Ok(Self {
            normalized: phone::normalize(phone)?,
            phone: phone.to_string(),
            auto_call: request.optional_bool("autoCall")?.unwrap_or(false),
        })
    }
}

/// Parameters of [`ActionKind::OpenSms`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsParams {
    /// Number as given by the caller, for the native composer
    pub phone: String,
    /// Canonical form, for the `sms:` fallback URI
    pub normalized: String,
    pub message: String,
}

impl SmsParams {
    pub fn from_request(request: &ActionRequest) -> Result<Self> {
        let phone = request.required_str("phone")?;
        Ok(Self {
            normalized: phone::normalize(phone)?,
            phone: phone.to_string(),
            message: request.optional_str("message")?.unwrap_or_default().to_string(),
        })
    }
}

/// What the chat-app action should open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Message,
    Call,
}

impl ChatMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "message" => Ok(ChatMode::Message),
            "call" => Ok(ChatMode::Call),
            other => Err(DeviceError::InvalidParameters(format!(
                "'mode' must be \"message\" or \"call\", got \"{}\"",
                other
            ))),
        }
    }
}

/// Parameters of [`ActionKind::OpenChat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatParams {
    /// Normalized phone number (see [`phone::normalize`])
    pub phone: String,
    pub message: String,
    pub mode: ChatMode,
}

impl ChatParams {
    pub fn from_request(request: &ActionRequest) -> Result<Self> {
        let phone = phone::normalize(request.required_str("phone")?)?;
        let mode = match request.optional_str("mode")? {
            Some(mode) => ChatMode::parse(mode)?,
            None => ChatMode::default(),
        };
        Ok(Self {
            phone,
            message: request.optional_str("message")?.unwrap_or_default().to_string(),
            mode,
        })
    }
}

/// Parameters of [`ActionKind::PickContact`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickParams {
    pub source: ContactSource,
}

impl PickParams {
    pub fn from_request(request: &ActionRequest) -> Result<Self> {
        let source = match request.optional_str("source")? {
            Some(source) => ContactSource::parse(source)?,
            None => ContactSource::Device,
        };
        Ok(Self { source })
    }
}

/// A category of OS-gated capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum PermissionKind {
    /// Placing phone calls without user confirmation
    CallCapability,
    /// Reading the device contact provider
    ContactsReadCapability,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 2] = [
        PermissionKind::CallCapability,
        PermissionKind::ContactsReadCapability,
    ];
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionKind::CallCapability => f.write_str("call"),
            PermissionKind::ContactsReadCapability => f.write_str("contacts-read"),
        }
    }
}

/// Authorization state of one permission kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    #[default]
    Undetermined,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn from_granted(granted: bool) -> Self {
        if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

/// Where a picked contact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactSource {
    Device,
    #[serde(rename = "chatapp", alias = "whatsapp")]
    ChatApp,
}

impl ContactSource {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "device" => Ok(ContactSource::Device),
            "chatapp" | "whatsapp" => Ok(ContactSource::ChatApp),
            other => Err(DeviceError::InvalidParameters(format!(
                "'source' must be \"device\" or \"chatapp\", got \"{}\"",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSource::Device => "device",
            ContactSource::ChatApp => "chatapp",
        }
    }
}

impl fmt::Display for ContactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResult {
    /// Display name; empty for organization-only contacts
    pub name: String,
    /// Always non-empty
    pub phone: String,
    /// The picker that actually produced this contact
    pub source: ContactSource,
}

/// Synchronous acknowledgement returned by the dispatcher
///
/// Reflects only whether the request was accepted. Picker results and
/// permission outcomes arrive later through the event emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum BridgeOutcome {
    Success {
        #[serde(default)]
        data: serde_json::Value,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl BridgeOutcome {
    pub fn accepted() -> Self {
        BridgeOutcome::Success {
            data: serde_json::Value::Null,
        }
    }

    pub fn accepted_with_message(message: impl Into<String>) -> Self {
        BridgeOutcome::Success {
            data: serde_json::json!({ "message": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BridgeOutcome::Success { .. })
    }

    /// Render as the host bridge response object
    ///
    /// `{success: true}`, `{success: true, message}`, or `{error}`.
    pub fn to_response(&self) -> serde_json::Value {
        match self {
            BridgeOutcome::Success { data } => {
                let mut response = serde_json::json!({ "success": true });
                if let Some(message) = data.get("message") {
                    response["message"] = message.clone();
                }
                response
            }
            BridgeOutcome::Error { message, .. } => serde_json::json!({ "error": message }),
        }
    }
}

impl From<DeviceError> for BridgeOutcome {
    fn from(err: DeviceError) -> Self {
        BridgeOutcome::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Name of the event emitted when a contact has been picked
pub const CONTACT_SELECTED: &str = "ContactSelected";

/// An event delivered back to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeEvent {
    /// Unique event identifier (evt-<uuid>)
    pub id: String,

    /// Event name subscribers are keyed on (e.g., "ContactSelected")
    pub name: String,

    pub payload: serde_json::Value,

    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl BridgeEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: format!("evt-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn contact_selected(contact: &ContactResult) -> Self {
        Self::new(
            CONTACT_SELECTED,
            serde_json::json!({
                "name": contact.name,
                "phone": contact.phone,
                "source": contact.source.as_str(),
            }),
        )
    }
}
