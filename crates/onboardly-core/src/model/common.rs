// ── Common types shared across the domain model ──

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::record_id::RecordId;

/// Content type of an inventory record.
///
/// Custom-field definitions and statuses are scoped by kind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecordKind {
    Site,
    Status,
    Manufacturer,
    DeviceType,
    DeviceRole,
    Platform,
    Device,
    Interface,
    IpAddress,
}

/// Custom-field values keyed by field name.
///
/// Populated by the store; the reconciler never writes these.
pub type CustomFields = BTreeMap<String, serde_json::Value>;

/// A lifecycle status, scoped to the record kinds it may be applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: RecordId,
    pub name: String,
    pub content_types: Vec<RecordKind>,
}

impl Status {
    pub fn applies_to(&self, kind: RecordKind) -> bool {
        self.content_types.contains(&kind)
    }
}

// ── Color ───────────────────────────────────────────────────────────

/// RGB color as six hex digits, normalized to lowercase (e.g. `ff0000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}': expected six hex digits")]
pub struct InvalidColor(pub String);

impl Color {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn default_role_color() -> Self {
        Self("ff0000".to_owned())
    }
}

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('#');
        if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(InvalidColor(s.to_owned()))
        }
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
