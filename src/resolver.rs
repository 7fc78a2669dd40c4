//! Contact resolver: turns raw picker rows into a `ContactResult`
//!
//! The device picker has a stable schema and is read field-by-field. The
//! chat app's schema changes between app versions, so its rows are matched
//! with an ordered list of tolerant field matchers: first match wins, and a
//! row where nothing yields a phone number resolves to `FallbackToDevice`.

use crate::config::{ChatAppConfig, DeviceFieldConfig};
use crate::gateway::{ContactRow, PickerResult};
use crate::phone;
use crate::types::{ContactResult, ContactSource};

/// What the resolver made of a picker result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ContactResult),
    /// The user backed out, or the picker returned no row
    Cancelled,
    /// A row came back but carried no usable phone number
    NoData,
    /// The chat-app row was unusable; retry with the device picker
    FallbackToDevice,
}

/// A predicate over field names, case-insensitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatcher {
    Exact(String),
    Contains(String),
}

impl FieldMatcher {
    pub fn matches(&self, field: &str) -> bool {
        let field = field.to_ascii_lowercase();
        match self {
            FieldMatcher::Exact(name) => field == name.to_ascii_lowercase(),
            FieldMatcher::Contains(needle) => field.contains(&needle.to_ascii_lowercase()),
        }
    }
}

/// How a matched phone field should be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhoneField {
    /// `<digits><separator><anything>`, e.g. `15551234567@s.whatsapp.net`
    Identifier(char),
    /// A plain phone number in any formatting
    Number,
}

/// Parses picker rows for both contact sources
#[derive(Debug, Clone)]
pub struct ContactResolver {
    device_fields: DeviceFieldConfig,
    name_matchers: Vec<FieldMatcher>,
    phone_matchers: Vec<(FieldMatcher, PhoneField)>,
}

impl ContactResolver {
    pub fn new(device_fields: DeviceFieldConfig, chat_app: &ChatAppConfig) -> Self {
        Self {
            device_fields,
            name_matchers: vec![FieldMatcher::Contains("name".to_string())],
            phone_matchers: vec![
                (
                    FieldMatcher::Exact(chat_app.identifier_field.clone()),
                    PhoneField::Identifier(chat_app.identifier_separator),
                ),
                (FieldMatcher::Contains("number".to_string()), PhoneField::Number),
                (FieldMatcher::Contains("phone".to_string()), PhoneField::Number),
            ],
        }
    }

    /// Resolve a picker result produced by `source`
    ///
    /// The returned contact is labelled with `source`, which callers must
    /// pass as the picker that actually ran.
    pub fn resolve(&self, source: ContactSource, result: &PickerResult) -> Resolution {
        let row = match result {
            PickerResult::Cancelled => return Resolution::Cancelled,
            PickerResult::Selected(rows) => match rows.first() {
                Some(row) if !row.is_empty() => row,
                _ => return Resolution::Cancelled,
            },
        };

        match source {
            ContactSource::Device => self.resolve_device(row),
            ContactSource::ChatApp => self.resolve_chat_app(row),
        }
    }

    fn resolve_device(&self, row: &ContactRow) -> Resolution {
        let phone = row
            .get(&self.device_fields.number)
            .map(str::trim)
            .unwrap_or_default();
        if phone.is_empty() {
            tracing::debug!("Device contact has no phone number");
            return Resolution::NoData;
        }
        let name = row
            .get(&self.device_fields.display_name)
            .map(str::trim)
            .unwrap_or_default();

        Resolution::Resolved(ContactResult {
            name: name.to_string(),
            phone: phone.to_string(),
            source: ContactSource::Device,
        })
    }

    fn resolve_chat_app(&self, row: &ContactRow) -> Resolution {
        let Some(phone) = self.extract_phone(row) else {
            tracing::debug!(
                fields = ?row.fields().map(|(k, _)| k).collect::<Vec<_>>(),
                "No phone field matched in chat-app contact"
            );
            return Resolution::FallbackToDevice;
        };

        let name = self
            .name_matchers
            .iter()
            .find_map(|matcher| {
                row.fields()
                    .find(|(field, value)| matcher.matches(field) && !value.trim().is_empty())
            })
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default();

        Resolution::Resolved(ContactResult {
            name,
            phone,
            source: ContactSource::ChatApp,
        })
    }

    /// Try each phone matcher in order; the first field that decodes wins
    fn extract_phone(&self, row: &ContactRow) -> Option<String> {
        self.phone_matchers.iter().find_map(|(matcher, kind)| {
            row.fields()
                .filter(|(field, _)| matcher.matches(field))
                .find_map(|(_, value)| decode_phone(value, *kind))
        })
    }
}

fn decode_phone(value: &str, kind: PhoneField) -> Option<String> {
    match kind {
        PhoneField::Identifier(separator) => {
            let local = value.split(separator).next().unwrap_or_default().trim();
            let digits: String = local.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                None
            } else {
                Some(format!("+{}", digits))
            }
        }
        PhoneField::Number => phone::normalize(value).ok(),
    }
}
