// ── In-memory inventory store ──
//
// A complete `InventoryStore` backed by one `RecordCollection` per kind.
// Safe to share between threads; every create is an atomic
// insert-if-absent on the kind's unique key.

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::collection::RecordCollection;
use super::requests::{
    DeviceFields, NewDeviceRole, NewDeviceType, NewInterface, NewIpAddress, NewManufacturer,
    NewPlatform,
};
use super::{DeviceQuery, DeviceTypeQuery, InventoryStore, Upserted};
use crate::error::StoreError;
use crate::model::{
    CustomFields, Device, DeviceRole, DeviceType, Interface, InterfaceAddress, IpAddress, IpFamily,
    Manufacturer, Platform, RecordId, RecordKind, Site, Slug, Status,
};

const DEVICE_STATUSES: &[&str] = &[
    "Active",
    "Planned",
    "Staged",
    "Failed",
    "Inventory",
    "Decommissioning",
    "Offline",
];

const IP_ADDRESS_STATUSES: &[&str] = &["Active", "Reserved", "Deprecated", "DHCP", "SLAAC"];

/// Thread-safe in-process inventory.
pub struct MemoryStore {
    sites: RecordCollection<Site>,
    statuses: RecordCollection<Status>,
    manufacturers: RecordCollection<Manufacturer>,
    device_types: RecordCollection<DeviceType>,
    device_roles: RecordCollection<DeviceRole>,
    platforms: RecordCollection<Platform>,
    devices: RecordCollection<Device>,
    interfaces: RecordCollection<Interface>,
    ip_addresses: RecordCollection<IpAddress>,
    /// Custom-field defaults per record kind.
    custom_field_defaults: DashMap<RecordKind, CustomFields>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty inventory seeded with the stock device and IP statuses.
    pub fn new() -> Self {
        let store = Self {
            sites: RecordCollection::new(),
            statuses: RecordCollection::new(),
            manufacturers: RecordCollection::new(),
            device_types: RecordCollection::new(),
            device_roles: RecordCollection::new(),
            platforms: RecordCollection::new(),
            devices: RecordCollection::new(),
            interfaces: RecordCollection::new(),
            ip_addresses: RecordCollection::new(),
            custom_field_defaults: DashMap::new(),
        };

        for name in DEVICE_STATUSES {
            let kinds = if IP_ADDRESS_STATUSES.contains(name) {
                vec![RecordKind::Device, RecordKind::IpAddress]
            } else {
                vec![RecordKind::Device]
            };
            store.insert_status(name, kinds);
        }
        for name in IP_ADDRESS_STATUSES {
            if !DEVICE_STATUSES.contains(name) {
                store.insert_status(name, vec![RecordKind::IpAddress]);
            }
        }

        store
    }

    fn insert_status(&self, name: &str, content_types: Vec<RecordKind>) {
        if let Err(err) = self.add_status(name, content_types) {
            warn!(status = name, %err, "skipping stock status");
        }
    }

    // ── Seeding helpers ──────────────────────────────────────────────

    /// Register a site. Sites are never created by the reconciler.
    pub fn add_site(&self, name: &str) -> Result<Site, StoreError> {
        let slug = Slug::from_name(name);
        self.sites
            .insert_unique(slug.as_str().to_owned(), |id| Site {
                id,
                name: name.to_owned(),
                slug: slug.clone(),
            })
            .map_err(|key| conflict(RecordKind::Site, key))
    }

    pub fn add_status(
        &self,
        name: &str,
        content_types: Vec<RecordKind>,
    ) -> Result<Status, StoreError> {
        self.statuses
            .insert_unique(name.to_owned(), |id| Status {
                id,
                name: name.to_owned(),
                content_types,
            })
            .map_err(|key| conflict(RecordKind::Status, key))
    }

    /// Declare a custom field with a default for one record kind.
    ///
    /// Only records created (or devices updated) afterwards receive it.
    pub fn define_custom_field(
        &self,
        kind: RecordKind,
        name: impl Into<String>,
        default: serde_json::Value,
    ) {
        self.custom_field_defaults
            .entry(kind)
            .or_default()
            .insert(name.into(), default);
    }

    /// Overwrite one custom-field value on an existing record.
    pub fn set_custom_field(
        &self,
        kind: RecordKind,
        id: &RecordId,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        let set = |cf: &mut CustomFields| {
            cf.insert(name.to_owned(), value.clone());
        };
        let found = match kind {
            RecordKind::Manufacturer => self
                .manufacturers
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::DeviceType => self
                .device_types
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::DeviceRole => self
                .device_roles
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::Platform => self
                .platforms
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::Device => self
                .devices
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::Interface => self
                .interfaces
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::IpAddress => self
                .ip_addresses
                .update(id, |r| set(&mut r.custom_fields))
                .is_some(),
            RecordKind::Site | RecordKind::Status => {
                return Err(StoreError::Integrity {
                    message: format!("{kind} records carry no custom fields"),
                });
            }
        };
        if found { Ok(()) } else { Err(not_found(kind, id)) }
    }

    /// Number of stored records of one kind.
    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Site => self.sites.len(),
            RecordKind::Status => self.statuses.len(),
            RecordKind::Manufacturer => self.manufacturers.len(),
            RecordKind::DeviceType => self.device_types.len(),
            RecordKind::DeviceRole => self.device_roles.len(),
            RecordKind::Platform => self.platforms.len(),
            RecordKind::Device => self.devices.len(),
            RecordKind::Interface => self.interfaces.len(),
            RecordKind::IpAddress => self.ip_addresses.len(),
        }
    }

    pub fn get_device(&self, id: &RecordId) -> Option<Device> {
        self.devices.get(id)
    }

    pub fn get_interface(&self, id: &RecordId) -> Option<Interface> {
        self.interfaces.get(id)
    }

    pub fn get_ip_address(&self, id: &RecordId) -> Option<IpAddress> {
        self.ip_addresses.get(id)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn defaults_for(&self, kind: RecordKind) -> CustomFields {
        self.custom_field_defaults
            .get(&kind)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Fill in missing defaults; existing values are left alone.
    fn apply_custom_field_defaults(&self, kind: RecordKind, fields: &mut CustomFields) {
        for (name, default) in self.defaults_for(kind) {
            fields.entry(name).or_insert(default);
        }
    }

    fn check_status(&self, kind: RecordKind, name: &str) -> Result<(), StoreError> {
        let known = self
            .statuses
            .get_by_key(name)
            .is_some_and(|s| s.applies_to(kind));
        if known {
            Ok(())
        } else {
            Err(StoreError::Integrity {
                message: format!("status '{name}' is not valid for {kind}"),
            })
        }
    }

    fn check_device_refs(&self, fields: &DeviceFields) -> Result<(), StoreError> {
        if self.sites.get(&fields.site).is_none() {
            return Err(not_found(RecordKind::Site, &fields.site));
        }
        if self.device_types.get(&fields.device_type).is_none() {
            return Err(not_found(RecordKind::DeviceType, &fields.device_type));
        }
        if self.device_roles.get(&fields.device_role).is_none() {
            return Err(not_found(RecordKind::DeviceRole, &fields.device_role));
        }
        if let Some(platform) = &fields.platform {
            if self.platforms.get(platform).is_none() {
                return Err(not_found(RecordKind::Platform, platform));
            }
        }
        if let Some(status) = &fields.status {
            self.check_status(RecordKind::Device, status)?;
        }
        Ok(())
    }

    fn create_device(&self, fields: DeviceFields) -> Result<Device, StoreError> {
        let status = fields.status.ok_or_else(|| StoreError::Integrity {
            message: format!("device '{}' requires a status", fields.name),
        })?;
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::Device, &mut custom_fields);
        let now = Utc::now();

        self.devices
            .insert_unique(device_key(&fields.site, &fields.name), |id| Device {
                id,
                name: fields.name.clone(),
                site: fields.site.clone(),
                device_type: fields.device_type.clone(),
                device_role: fields.device_role.clone(),
                platform: fields.platform.clone(),
                status,
                serial: fields.serial.clone(),
                primary_ip4: None,
                primary_ip6: None,
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::Device, key))
    }

    fn update_device(&self, id: &RecordId, fields: DeviceFields) -> Result<Device, StoreError> {
        let current = self
            .devices
            .get(id)
            .ok_or_else(|| not_found(RecordKind::Device, id))?;

        self.devices
            .rekey(
                &device_key(&current.site, &current.name),
                device_key(&fields.site, &fields.name),
                id,
            )
            .map_err(|key| conflict(RecordKind::Device, key))?;

        let defaults = self.defaults_for(RecordKind::Device);
        self.devices
            .update(id, |d| {
                d.name = fields.name;
                d.site = fields.site;
                d.device_type = fields.device_type;
                d.device_role = fields.device_role;
                d.platform = fields.platform;
                d.serial = fields.serial;
                if let Some(status) = fields.status {
                    d.status = status;
                }
                for (name, default) in defaults {
                    d.custom_fields.entry(name).or_insert(default);
                }
                d.last_updated = Utc::now();
            })
            .ok_or_else(|| not_found(RecordKind::Device, id))
    }

    /// Clear `ip` from the primary pointers of a device that no longer owns it.
    fn release_primary(&self, device: &RecordId, ip: &RecordId) {
        self.devices.update(device, |d| {
            if d.primary_ip4.as_ref() == Some(ip) {
                d.primary_ip4 = None;
            }
            if d.primary_ip6.as_ref() == Some(ip) {
                d.primary_ip6 = None;
            }
        });
    }
}

fn device_key(site: &RecordId, name: &str) -> String {
    format!("{site}/{name}")
}

fn interface_key(device: &RecordId, name: &str) -> String {
    format!("{device}/{name}")
}

fn conflict(kind: RecordKind, key: String) -> StoreError {
    StoreError::Conflict { kind, key }
}

fn not_found(kind: RecordKind, id: &RecordId) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl InventoryStore for MemoryStore {
    fn find_site(&self, slug: &Slug) -> Result<Option<Site>, StoreError> {
        Ok(self.sites.get_by_key(slug.as_str()))
    }

    fn find_statuses(&self, kind: RecordKind, name: &str) -> Result<Vec<Status>, StoreError> {
        Ok(self
            .statuses
            .filter(|s| s.name == name && s.applies_to(kind)))
    }

    fn find_manufacturer(&self, slug: &Slug) -> Result<Option<Manufacturer>, StoreError> {
        Ok(self.manufacturers.get_by_key(slug.as_str()))
    }

    fn get_manufacturer(&self, id: &RecordId) -> Result<Manufacturer, StoreError> {
        self.manufacturers
            .get(id)
            .ok_or_else(|| not_found(RecordKind::Manufacturer, id))
    }

    fn create_manufacturer(&self, new: NewManufacturer) -> Result<Manufacturer, StoreError> {
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::Manufacturer, &mut custom_fields);
        let now = Utc::now();

        let created = self
            .manufacturers
            .insert_unique(new.slug.as_str().to_owned(), |id| Manufacturer {
                id,
                name: new.name,
                slug: new.slug.clone(),
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::Manufacturer, key))?;
        debug!(slug = %created.slug, "stored manufacturer");
        Ok(created)
    }

    fn find_device_types(
        &self,
        query: &DeviceTypeQuery<'_>,
    ) -> Result<Vec<DeviceType>, StoreError> {
        Ok(match *query {
            DeviceTypeQuery::Slug { slug, manufacturer } => self
                .device_types
                .get_by_key(slug.as_str())
                .filter(|dt| manufacturer.is_none_or(|m| &dt.manufacturer == m))
                .into_iter()
                .collect(),
            DeviceTypeQuery::Model(model) => self
                .device_types
                .filter(|dt| eq_ignore_case(&dt.model, model)),
            DeviceTypeQuery::PartNumber(part) => self.device_types.filter(|dt| {
                dt.part_number
                    .as_deref()
                    .is_some_and(|p| eq_ignore_case(p, part))
            }),
        })
    }

    fn get_device_type(&self, id: &RecordId) -> Result<DeviceType, StoreError> {
        self.device_types
            .get(id)
            .ok_or_else(|| not_found(RecordKind::DeviceType, id))
    }

    fn create_device_type(&self, new: NewDeviceType) -> Result<DeviceType, StoreError> {
        if self.manufacturers.get(&new.manufacturer).is_none() {
            return Err(not_found(RecordKind::Manufacturer, &new.manufacturer));
        }
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::DeviceType, &mut custom_fields);
        let now = Utc::now();

        self.device_types
            .insert_unique(new.slug.as_str().to_owned(), |id| DeviceType {
                id,
                manufacturer: new.manufacturer,
                model: new.model,
                slug: new.slug.clone(),
                part_number: new.part_number,
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::DeviceType, key))
    }

    fn find_device_role(&self, slug: &Slug) -> Result<Option<DeviceRole>, StoreError> {
        Ok(self.device_roles.get_by_key(slug.as_str()))
    }

    fn create_device_role(&self, new: NewDeviceRole) -> Result<DeviceRole, StoreError> {
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::DeviceRole, &mut custom_fields);
        let now = Utc::now();

        self.device_roles
            .insert_unique(new.slug.as_str().to_owned(), |id| DeviceRole {
                id,
                name: new.name,
                slug: new.slug.clone(),
                color: new.color,
                vm_role: new.vm_role,
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::DeviceRole, key))
    }

    fn find_platform(&self, slug: &Slug) -> Result<Option<Platform>, StoreError> {
        Ok(self.platforms.get_by_key(slug.as_str()))
    }

    fn list_platforms(&self) -> Result<Vec<Platform>, StoreError> {
        Ok(self.platforms.filter(|_| true))
    }

    fn create_platform(&self, new: NewPlatform) -> Result<Platform, StoreError> {
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::Platform, &mut custom_fields);
        let now = Utc::now();

        self.platforms
            .insert_unique(new.slug.as_str().to_owned(), |id| Platform {
                id,
                name: new.name,
                slug: new.slug.clone(),
                napalm_driver: new.napalm_driver,
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::Platform, key))
    }

    fn find_devices(&self, query: &DeviceQuery<'_>) -> Result<Vec<Device>, StoreError> {
        Ok(match *query {
            DeviceQuery::NameInSite { name, site } => self
                .devices
                .get_by_key(&device_key(site, name))
                .into_iter()
                .collect(),
            DeviceQuery::Serial(serial) => self
                .devices
                .filter(|d| d.serial.as_deref() == Some(serial)),
            DeviceQuery::PrimaryIp(ip) => {
                let ids: Vec<RecordId> = self
                    .ip_addresses
                    .filter(|a| a.address.ip() == ip)
                    .into_iter()
                    .map(|a| a.id)
                    .collect();
                self.devices.filter(|d| {
                    [&d.primary_ip4, &d.primary_ip6]
                        .into_iter()
                        .flatten()
                        .any(|p| ids.contains(p))
                })
            }
        })
    }

    fn create_or_update_device(
        &self,
        existing: Option<&RecordId>,
        fields: DeviceFields,
    ) -> Result<Upserted<Device>, StoreError> {
        self.check_device_refs(&fields)?;
        match existing {
            Some(id) => Ok(Upserted {
                record: self.update_device(id, fields)?,
                created: false,
            }),
            None => Ok(Upserted {
                record: self.create_device(fields)?,
                created: true,
            }),
        }
    }

    fn find_interface(
        &self,
        device: &RecordId,
        name: &str,
    ) -> Result<Option<Interface>, StoreError> {
        Ok(self.interfaces.get_by_key(&interface_key(device, name)))
    }

    fn create_interface(&self, new: NewInterface) -> Result<Interface, StoreError> {
        if self.devices.get(&new.device).is_none() {
            return Err(not_found(RecordKind::Device, &new.device));
        }
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::Interface, &mut custom_fields);
        let now = Utc::now();

        self.interfaces
            .insert_unique(interface_key(&new.device, &new.name), |id| Interface {
                id,
                device: new.device.clone(),
                name: new.name.clone(),
                kind: new.kind,
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::Interface, key))
    }

    fn find_ip_address(&self, address: &InterfaceAddress) -> Result<Option<IpAddress>, StoreError> {
        Ok(self.ip_addresses.get_by_key(&address.to_string()))
    }

    fn create_ip_address(&self, new: NewIpAddress) -> Result<IpAddress, StoreError> {
        self.check_status(RecordKind::IpAddress, &new.status)?;
        let mut custom_fields = CustomFields::new();
        self.apply_custom_field_defaults(RecordKind::IpAddress, &mut custom_fields);
        let now = Utc::now();

        self.ip_addresses
            .insert_unique(new.address.to_string(), |id| IpAddress {
                id,
                address: new.address,
                status: new.status,
                assigned_interface: None,
                custom_fields,
                created: now,
                last_updated: now,
            })
            .map_err(|key| conflict(RecordKind::IpAddress, key))
    }

    fn assign_ip_to_interface(
        &self,
        ip: &RecordId,
        interface: &RecordId,
    ) -> Result<IpAddress, StoreError> {
        let target = self
            .interfaces
            .get(interface)
            .ok_or_else(|| not_found(RecordKind::Interface, interface))?;
        let current = self
            .ip_addresses
            .get(ip)
            .ok_or_else(|| not_found(RecordKind::IpAddress, ip))?;

        if let Some(previous) = current
            .assigned_interface
            .as_ref()
            .and_then(|i| self.interfaces.get(i))
        {
            if previous.device != target.device {
                self.release_primary(&previous.device, ip);
            }
        }

        self.ip_addresses
            .update(ip, |a| {
                a.assigned_interface = Some(interface.clone());
                a.last_updated = Utc::now();
            })
            .ok_or_else(|| not_found(RecordKind::IpAddress, ip))
    }

    fn set_device_primary_ip(
        &self,
        device: &RecordId,
        ip: &RecordId,
    ) -> Result<Device, StoreError> {
        let address = self
            .ip_addresses
            .get(ip)
            .ok_or_else(|| not_found(RecordKind::IpAddress, ip))?;
        let owner = address
            .assigned_interface
            .as_ref()
            .and_then(|i| self.interfaces.get(i))
            .map(|i| i.device);
        if owner.as_ref() != Some(device) {
            return Err(StoreError::Integrity {
                message: format!(
                    "{} is not assigned to an interface of device {device}",
                    address.address
                ),
            });
        }

        self.devices
            .update(device, |d| {
                match address.address.family() {
                    IpFamily::V4 => d.primary_ip4 = Some(ip.clone()),
                    IpFamily::V6 => d.primary_ip6 = Some(ip.clone()),
                }
                d.last_updated = Utc::now();
            })
            .ok_or_else(|| not_found(RecordKind::Device, device))
    }
}
