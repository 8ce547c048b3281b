// ── DCIM domain types ──
//
// Sites, hardware catalog (manufacturer / device type / platform),
// roles, devices and their interfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::common::{Color, CustomFields};
use super::record_id::RecordId;
use super::slug::Slug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: RecordId,
    pub name: String,
    pub slug: Slug,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: RecordId,
    pub name: String,
    pub slug: Slug,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Hardware model of a manufacturer. Slugs are unique across manufacturers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: RecordId,
    pub manufacturer: RecordId,
    pub model: String,
    pub slug: Slug,
    pub part_number: Option<String>,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRole {
    pub id: RecordId,
    pub name: String,
    pub slug: Slug,
    pub color: Color,
    pub vm_role: bool,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Software platform a device runs, optionally tagged with the napalm
/// driver used to automate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: RecordId,
    pub name: String,
    pub slug: Slug,
    pub napalm_driver: Option<String>,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: RecordId,
    pub name: String,
    pub site: RecordId,
    pub device_type: RecordId,
    pub device_role: RecordId,
    pub platform: Option<RecordId>,
    /// Status name, validated against the store's device statuses.
    pub status: String,
    pub serial: Option<String>,
    pub primary_ip4: Option<RecordId>,
    pub primary_ip6: Option<RecordId>,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Physical or logical interface type. Onboarding cannot infer media or
/// speed from the discovered facts, so it only ever creates `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InterfaceType {
    #[default]
    Other,
    Virtual,
    Lag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub id: RecordId,
    pub device: RecordId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InterfaceType,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}
