// ── Typed write requests for the inventory store ──
//
// Each create/update operation of `InventoryStore` takes one of these
// instead of a loose field map. Ids, timestamps and custom fields are
// filled in by the store.

use serde::{Deserialize, Serialize};

use crate::model::{Color, InterfaceAddress, InterfaceType, RecordId, Slug};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewManufacturer {
    pub name: String,
    pub slug: Slug,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeviceType {
    pub manufacturer: RecordId,
    pub model: String,
    pub slug: Slug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeviceRole {
    pub name: String,
    pub slug: Slug,
    pub color: Color,
    pub vm_role: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlatform {
    pub name: String,
    pub slug: Slug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub napalm_driver: Option<String>,
}

/// Mutable device attributes written by `create_or_update_device`.
///
/// On update every field is last-write-wins, except `status`: `None`
/// leaves the existing status in place. A create requires a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFields {
    pub name: String,
    pub site: RecordId,
    pub device_type: RecordId,
    pub device_role: RecordId,
    pub platform: Option<RecordId>,
    pub status: Option<String>,
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInterface {
    pub device: RecordId,
    pub name: String,
    pub kind: InterfaceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIpAddress {
    pub address: InterfaceAddress,
    pub status: String,
}
