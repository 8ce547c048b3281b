// ── Inventory store boundary ──
//
// The reconciler reads and writes the inventory exclusively through the
// `InventoryStore` trait. `MemoryStore` is a complete in-process
// implementation used by tests and embedders without a remote inventory.

pub(crate) mod collection;
pub mod memory;
pub mod requests;

use std::fmt;
use std::net::IpAddr;

use crate::error::StoreError;
use crate::model::{
    Device, DeviceRole, DeviceType, Interface, InterfaceAddress, IpAddress, Manufacturer, Platform,
    RecordId, RecordKind, Site, Slug, Status,
};

pub use memory::MemoryStore;
pub use requests::{
    DeviceFields, NewDeviceRole, NewDeviceType, NewInterface, NewIpAddress, NewManufacturer,
    NewPlatform,
};

// ── Queries ─────────────────────────────────────────────────────────

/// Lookup criteria for device types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTypeQuery<'a> {
    /// Exact slug, optionally scoped to one manufacturer.
    Slug {
        slug: &'a Slug,
        manufacturer: Option<&'a RecordId>,
    },
    /// Case-insensitive model name.
    Model(&'a str),
    /// Case-insensitive part number.
    PartNumber(&'a str),
}

impl fmt::Display for DeviceTypeQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slug {
                slug,
                manufacturer: Some(m),
            } => write!(f, "slug={slug}, manufacturer={m}"),
            Self::Slug {
                slug,
                manufacturer: None,
            } => write!(f, "slug={slug}"),
            Self::Model(model) => write!(f, "model={model}"),
            Self::PartNumber(part) => write!(f, "part_number={part}"),
        }
    }
}

/// Lookup criteria for devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceQuery<'a> {
    /// Exact name within one site.
    NameInSite { name: &'a str, site: &'a RecordId },
    /// Exact serial number.
    Serial(&'a str),
    /// Host part of the device's primary IPv4 or IPv6 address.
    PrimaryIp(IpAddr),
}

impl fmt::Display for DeviceQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameInSite { name, site } => write!(f, "name={name}, site={site}"),
            Self::Serial(serial) => write!(f, "serial={serial}"),
            Self::PrimaryIp(ip) => write!(f, "primary_ip={ip}"),
        }
    }
}

/// Outcome of an upsert: the stored record and whether it was new.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
    pub record: T,
    pub created: bool,
}

// ── InventoryStore ──────────────────────────────────────────────────

/// CRUD surface of the inventory the reconciler writes into.
///
/// Implementations must uphold these contracts:
///
/// - `create_*` is an atomic insert-if-absent on the record's unique key
///   and fails with [`StoreError::Conflict`] when the key is taken.
/// - Every create (and a device update) leaves the record with the
///   configured custom-field defaults for its kind filled in, without
///   overwriting values already present. Callers never set these.
/// - `set_device_primary_ip` rejects an address that is not assigned to an
///   interface of that device.
pub trait InventoryStore: Send + Sync {
    fn find_site(&self, slug: &Slug) -> Result<Option<Site>, StoreError>;

    fn find_statuses(&self, kind: RecordKind, name: &str) -> Result<Vec<Status>, StoreError>;

    fn find_manufacturer(&self, slug: &Slug) -> Result<Option<Manufacturer>, StoreError>;

    fn get_manufacturer(&self, id: &RecordId) -> Result<Manufacturer, StoreError>;

    fn create_manufacturer(&self, new: NewManufacturer) -> Result<Manufacturer, StoreError>;

    fn find_device_types(&self, query: &DeviceTypeQuery<'_>) -> Result<Vec<DeviceType>, StoreError>;

    fn get_device_type(&self, id: &RecordId) -> Result<DeviceType, StoreError>;

    fn create_device_type(&self, new: NewDeviceType) -> Result<DeviceType, StoreError>;

    fn find_device_role(&self, slug: &Slug) -> Result<Option<DeviceRole>, StoreError>;

    fn create_device_role(&self, new: NewDeviceRole) -> Result<DeviceRole, StoreError>;

    fn find_platform(&self, slug: &Slug) -> Result<Option<Platform>, StoreError>;

    fn list_platforms(&self) -> Result<Vec<Platform>, StoreError>;

    fn create_platform(&self, new: NewPlatform) -> Result<Platform, StoreError>;

    fn find_devices(&self, query: &DeviceQuery<'_>) -> Result<Vec<Device>, StoreError>;

    /// Update `existing` in place, or create a new device when `None`.
    fn create_or_update_device(
        &self,
        existing: Option<&RecordId>,
        fields: DeviceFields,
    ) -> Result<Upserted<Device>, StoreError>;

    fn find_interface(
        &self,
        device: &RecordId,
        name: &str,
    ) -> Result<Option<Interface>, StoreError>;

    fn create_interface(&self, new: NewInterface) -> Result<Interface, StoreError>;

    fn find_ip_address(&self, address: &InterfaceAddress) -> Result<Option<IpAddress>, StoreError>;

    fn create_ip_address(&self, new: NewIpAddress) -> Result<IpAddress, StoreError>;

    /// Assign an address to an interface, replacing any prior assignment.
    fn assign_ip_to_interface(
        &self,
        ip: &RecordId,
        interface: &RecordId,
    ) -> Result<IpAddress, StoreError>;

    /// Point the device's primary IP for the address family at `ip`.
    fn set_device_primary_ip(&self, device: &RecordId, ip: &RecordId) -> Result<Device, StoreError>;
}
