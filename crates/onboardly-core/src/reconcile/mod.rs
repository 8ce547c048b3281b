// ── Reconciler ──
//
// Resolves one device's discovered facts into inventory records, step by
// step: site, manufacturer, device type, role, platform, the device
// itself, then its management interface and primary IP. Each step looks
// up before it creates, so re-running converges on the same records.

mod matching;
mod platform;

use std::net::IpAddr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MatchStrategy, ReconcilerConfig};
use crate::error::{OnboardError, StoreError};
use crate::facts::DiscoveredFacts;
use crate::model::{
    Color, Device, DeviceRole, DeviceType, Interface, InterfaceAddress, InterfaceType, IpAddress,
    Manufacturer, Platform, RecordKind, Site, Slug, Status,
};
use crate::store::{
    DeviceFields, DeviceQuery, DeviceTypeQuery, InventoryStore, NewDeviceRole, NewDeviceType,
    NewInterface, NewIpAddress, NewManufacturer, NewPlatform,
};

use self::matching::{create_or_adopt, first_match, resolve_status, slug_for};
use self::platform::{napalm_driver, platform_name};

// ── Step inputs and outputs ─────────────────────────────────────────

/// Resolved records a device write depends on.
///
/// Built only from records returned by earlier reconciler steps, so a
/// device can never be written against unresolved references.
#[derive(Debug, Clone, Copy)]
pub struct DeviceDependencies<'r> {
    site: &'r Site,
    device_type: &'r DeviceType,
    device_role: &'r DeviceRole,
    platform: Option<&'r Platform>,
}

impl<'r> DeviceDependencies<'r> {
    pub fn new(
        site: &'r Site,
        device_type: &'r DeviceType,
        device_role: &'r DeviceRole,
        platform: Option<&'r Platform>,
    ) -> Self {
        Self {
            site,
            device_type,
            device_role,
            platform,
        }
    }
}

/// Everything one onboarding run resolved, in reportable form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnboardingResult {
    pub site: Site,
    pub manufacturer: Manufacturer,
    pub device_type: DeviceType,
    pub device_role: DeviceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub device: Device,
    /// `false` when an existing device was updated in place.
    pub device_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_interface: Option<Interface>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip: Option<IpAddress>,
}

// ── Reconciler ──────────────────────────────────────────────────────

/// Onboards one device into an [`InventoryStore`].
///
/// Every `ensure_*` step binds what it resolved into the reconciler and
/// returns it; steps that depend on an earlier one take the earlier
/// record as an argument. [`ensure_device`](Self::ensure_device) runs the
/// whole pipeline. Nothing is ever deleted, and a failing step aborts
/// before any later write.
pub struct Reconciler<'a, S: InventoryStore + ?Sized> {
    store: &'a S,
    config: &'a ReconcilerConfig,
    facts: DiscoveredFacts,

    onboarded_device: Option<Device>,
    site: Option<Site>,
    manufacturer: Option<Manufacturer>,
    device_type: Option<DeviceType>,
    device_role: Option<DeviceRole>,
    platform: Option<Platform>,
    device: Option<Device>,
    device_created: bool,
    management_interface: Option<Interface>,
    primary_ip: Option<IpAddress>,
}

impl<'a, S: InventoryStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, config: &'a ReconcilerConfig, facts: DiscoveredFacts) -> Self {
        Self {
            store,
            config,
            facts,
            onboarded_device: None,
            site: None,
            manufacturer: None,
            device_type: None,
            device_role: None,
            platform: None,
            device: None,
            device_created: false,
            management_interface: None,
            primary_ip: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn facts(&self) -> &DiscoveredFacts {
        &self.facts
    }

    /// The existing device matched by management IP, if any.
    pub fn onboarded_device(&self) -> Option<&Device> {
        self.onboarded_device.as_ref()
    }

    pub fn site(&self) -> Option<&Site> {
        self.site.as_ref()
    }

    /// The bound manufacturer. A loose device-type match may rebind it to
    /// the matched record's owner.
    pub fn manufacturer(&self) -> Option<&Manufacturer> {
        self.manufacturer.as_ref()
    }

    pub fn device_type(&self) -> Option<&DeviceType> {
        self.device_type.as_ref()
    }

    pub fn device_role(&self) -> Option<&DeviceRole> {
        self.device_role.as_ref()
    }

    pub fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn device_created(&self) -> bool {
        self.device_created
    }

    pub fn management_interface(&self) -> Option<&Interface> {
        self.management_interface.as_ref()
    }

    pub fn primary_ip(&self) -> Option<&IpAddress> {
        self.primary_ip.as_ref()
    }

    // ── Steps ────────────────────────────────────────────────────────

    /// Look for a device already holding the management IP as its primary
    /// address. A match becomes the update target for the device write.
    pub fn ensure_onboarded_device(&mut self) -> Result<Option<Device>, OnboardError> {
        self.onboarded_device = None;
        let Some(ip) = self.mgmt_ip()? else {
            return Ok(None);
        };

        let mut found = self.store.find_devices(&DeviceQuery::PrimaryIp(ip))?;
        match found.len() {
            0 => info!(%ip, "no existing device for management IP"),
            1 => {
                self.onboarded_device = found.pop();
                if let Some(device) = &self.onboarded_device {
                    debug!(%ip, device = %device.name, "management IP belongs to existing device");
                }
            }
            _ => {
                return Err(OnboardError::general(format!(
                    "multiple devices using same IP: {ip}"
                )));
            }
        }
        Ok(self.onboarded_device.clone())
    }

    /// Sites are never created; the facts must name an existing one.
    pub fn ensure_device_site(&mut self) -> Result<Site, OnboardError> {
        let slug = Slug::from(self.facts.site.trim());
        let site = self
            .store
            .find_site(&slug)?
            .ok_or_else(|| OnboardError::config(format!("site not found: {slug}")))?;
        debug!(site = %site.slug, "resolved site");

        self.site = Some(site.clone());
        Ok(site)
    }

    pub fn ensure_device_manufacturer(
        &mut self,
        create_if_missing: bool,
    ) -> Result<Manufacturer, OnboardError> {
        let store = self.store;

        if self.config.skip_manufacturer_on_update {
            if let Some(target) = &self.onboarded_device {
                let device_type = store.get_device_type(&target.device_type)?;
                let manufacturer = store.get_manufacturer(&device_type.manufacturer)?;
                debug!(
                    manufacturer = %manufacturer.slug,
                    "keeping manufacturer of existing device"
                );
                self.manufacturer = Some(manufacturer.clone());
                return Ok(manufacturer);
            }
        }

        let vendor = self.facts.vendor.trim().to_owned();
        let slug = slug_for("vendor", &vendor)?;

        let manufacturer = match store.find_manufacturer(&slug)? {
            Some(found) => {
                debug!(manufacturer = %found.slug, "reusing manufacturer");
                found
            }
            None if !create_if_missing => {
                return Err(OnboardError::config(format!(
                    "manufacturer not found: {vendor}"
                )));
            }
            None => create_or_adopt(
                || {
                    store
                        .create_manufacturer(NewManufacturer {
                            name: vendor.clone(),
                            slug: slug.clone(),
                        })
                        .inspect(|m| info!(manufacturer = %m.slug, "created manufacturer"))
                },
                || Ok(store.find_manufacturer(&slug)?),
            )?,
        };

        self.manufacturer = Some(manufacturer.clone());
        Ok(manufacturer)
    }

    /// Resolve the device type of `manufacturer`.
    ///
    /// Strict matching only accepts the slug under `manufacturer`. Loose
    /// matching falls back to model and part number and trusts the matched
    /// record's manufacturer, rebinding it when it differs.
    pub fn ensure_device_type(
        &mut self,
        manufacturer: &Manufacturer,
        create_if_missing: bool,
    ) -> Result<DeviceType, OnboardError> {
        let store = self.store;
        let strategy = self.strategy();

        if self.config.skip_device_type_on_update {
            if let Some(target) = &self.onboarded_device {
                let device_type = store.get_device_type(&target.device_type)?;
                debug!(device_type = %device_type.slug, "keeping device type of existing device");
                self.device_type = Some(device_type.clone());
                return Ok(device_type);
            }
        }

        let model = non_empty(self.facts.model.as_deref()).map(normalize_model);
        let text = non_empty(self.facts.device_type.as_deref())
            .map(str::to_owned)
            .or_else(|| model.clone())
            .ok_or_else(|| OnboardError::config("device type not found"))?;
        let display = model.clone().unwrap_or_else(|| text.clone());
        let slug = slug_for("device type", &text)?;

        let scope = match strategy {
            MatchStrategy::Strict => Some(&manufacturer.id),
            MatchStrategy::Loose => None,
        };
        let mut criteria = vec![DeviceTypeQuery::Slug {
            slug: &slug,
            manufacturer: scope,
        }];
        if let Some(model) = model.as_deref() {
            criteria.push(DeviceTypeQuery::Model(model));
            criteria.push(DeviceTypeQuery::PartNumber(model));
        }

        let existing = first_match(strategy, "device types", &criteria, |q| {
            store.find_device_types(q)
        })?;

        let device_type = match existing {
            Some(found) => {
                debug!(device_type = %found.slug, "reusing device type");
                found
            }
            None if !create_if_missing => {
                return Err(OnboardError::config(format!(
                    "device type not found: {display}"
                )));
            }
            None => {
                // Slugs are unique across manufacturers.
                let taken = store
                    .find_device_types(&DeviceTypeQuery::Slug {
                        slug: &slug,
                        manufacturer: None,
                    })?
                    .into_iter()
                    .find(|dt| dt.manufacturer != manufacturer.id);
                if let Some(taken) = taken {
                    let owner = store.get_manufacturer(&taken.manufacturer)?;
                    return Err(OnboardError::config(format!(
                        "device type {display} already exists for vendor {}",
                        owner.name
                    )));
                }

                create_or_adopt(
                    || {
                        store
                            .create_device_type(NewDeviceType {
                                manufacturer: manufacturer.id.clone(),
                                model: display.clone(),
                                slug: slug.clone(),
                                part_number: None,
                            })
                            .inspect(|dt| info!(device_type = %dt.slug, "created device type"))
                    },
                    || {
                        first_match(strategy, "device types", &criteria[..1], |q| {
                            store.find_device_types(q)
                        })
                    },
                )?
            }
        };

        if device_type.manufacturer != manufacturer.id {
            let owner = store.get_manufacturer(&device_type.manufacturer)?;
            debug!(
                device_type = %device_type.slug,
                manufacturer = %owner.slug,
                "device type belongs to another manufacturer, rebinding"
            );
            self.manufacturer = Some(owner);
        }

        self.device_type = Some(device_type.clone());
        Ok(device_type)
    }

    /// Resolve the role named in the facts, or the configured default.
    /// An existing role is bound unchanged, color included.
    pub fn ensure_device_role(
        &mut self,
        create_if_missing: bool,
    ) -> Result<DeviceRole, OnboardError> {
        let store = self.store;
        let role = non_empty(self.facts.role.as_deref())
            .unwrap_or(self.config.default_device_role.as_str())
            .to_owned();
        let slug = slug_for("device role", &role)?;

        let device_role = match store.find_device_role(&slug)? {
            Some(found) => {
                debug!(device_role = %found.slug, "reusing device role");
                found
            }
            None if !create_if_missing => {
                return Err(OnboardError::config(format!(
                    "device role not found: {role}"
                )));
            }
            None => {
                let color = match non_empty(self.facts.role_color.as_deref()) {
                    Some(raw) => raw
                        .parse::<Color>()
                        .map_err(|e| OnboardError::general(e.to_string()))?,
                    None => self.config.default_device_role_color.clone(),
                };
                create_or_adopt(
                    || {
                        store
                            .create_device_role(NewDeviceRole {
                                name: role.clone(),
                                slug: slug.clone(),
                                color,
                                vm_role: false,
                            })
                            .inspect(|r| info!(device_role = %r.slug, "created device role"))
                    },
                    || Ok(store.find_device_role(&slug)?),
                )?
            }
        };

        self.device_role = Some(device_role.clone());
        Ok(device_role)
    }

    /// Resolve the platform. Returns `None`, leaving the device without a
    /// platform, when the facts carry neither a platform nor a driver.
    pub fn ensure_device_platform(
        &mut self,
        create_if_missing: bool,
    ) -> Result<Option<Platform>, OnboardError> {
        let store = self.store;
        self.platform = None;

        let Some(name) = platform_name(&self.facts, self.config) else {
            warn!(hostname = %self.facts.hostname, "no platform information, skipping platform");
            return Ok(None);
        };
        let slug = slug_for("platform", &name)?;

        let platform = match store.find_platform(&slug)? {
            Some(found) => {
                debug!(platform = %found.slug, "reusing platform");
                found
            }
            None if !create_if_missing => {
                return Err(OnboardError::config(format!(
                    "device platform not found: {name}"
                )));
            }
            None => {
                let driver = match non_empty(self.facts.driver.as_deref()) {
                    Some(driver) => napalm_driver(self.config, driver, &store.list_platforms()?),
                    None => None,
                };
                create_or_adopt(
                    || {
                        store
                            .create_platform(NewPlatform {
                                name: name.clone(),
                                slug: slug.clone(),
                                napalm_driver: driver,
                            })
                            .inspect(|p| {
                                info!(
                                    platform = %p.slug,
                                    napalm_driver = ?p.napalm_driver,
                                    "created platform"
                                );
                            })
                    },
                    || Ok(store.find_platform(&slug)?),
                )?
            }
        };

        self.platform = Some(platform.clone());
        Ok(Some(platform))
    }

    /// Create the device, or update the matched one in place.
    ///
    /// The update target is the device matched by management IP when
    /// there is one, otherwise the result of a strategy-driven lookup.
    pub fn ensure_device_instance(
        &mut self,
        deps: &DeviceDependencies<'_>,
    ) -> Result<Device, OnboardError> {
        let store = self.store;
        let status = resolve_status(
            store,
            RecordKind::Device,
            "device",
            &self.config.default_device_status,
        )?;

        let target = match &self.onboarded_device {
            Some(device) => {
                info!(
                    device = %device.name,
                    hostname = %self.facts.hostname,
                    "updating device matched by management IP"
                );
                Some(device.id.clone())
            }
            None => self.find_existing_device(deps.site)?.map(|d| d.id),
        };

        let status = if target.is_some() && self.config.preserve_status_on_update {
            None
        } else {
            Some(status.name)
        };
        let fields = DeviceFields {
            name: self.facts.hostname.trim().to_owned(),
            site: deps.site.id.clone(),
            device_type: deps.device_type.id.clone(),
            device_role: deps.device_role.id.clone(),
            platform: deps.platform.map(|p| p.id.clone()),
            status,
            serial: non_empty(self.facts.serial.as_deref()).map(str::to_owned),
        };

        let upserted = match store.create_or_update_device(target.as_ref(), fields.clone()) {
            Err(StoreError::Conflict { kind, key }) if target.is_none() => {
                debug!(%key, "device create lost the race, updating the winner");
                let winner = self
                    .find_existing_device(deps.site)?
                    .ok_or(StoreError::Conflict { kind, key })?;
                store.create_or_update_device(Some(&winner.id), fields)?
            }
            other => other?,
        };

        let device = upserted.record;
        if upserted.created {
            info!(device = %device.name, status = %device.status, "created device");
        } else {
            info!(device = %device.name, status = %device.status, "updated device");
        }

        self.device = Some(device.clone());
        self.device_created = upserted.created;
        Ok(device)
    }

    /// Find or create the management interface on `device`. Returns `None`
    /// when the facts name no interface.
    pub fn ensure_interface(&mut self, device: &Device) -> Result<Option<Interface>, OnboardError> {
        let store = self.store;
        self.management_interface = None;

        let Some(name) = non_empty(self.facts.mgmt_interface.as_deref()).map(str::to_owned) else {
            debug!(device = %device.name, "no management interface, skipping");
            return Ok(None);
        };

        let interface = match store.find_interface(&device.id, &name)? {
            Some(found) => {
                debug!(interface = %found.name, "reusing interface");
                found
            }
            None => create_or_adopt(
                || {
                    store
                        .create_interface(NewInterface {
                            device: device.id.clone(),
                            name: name.clone(),
                            kind: InterfaceType::Other,
                        })
                        .inspect(|i| {
                            info!(device = %device.name, interface = %i.name, "created interface");
                        })
                },
                || Ok(store.find_interface(&device.id, &name)?),
            )?,
        };

        self.management_interface = Some(interface.clone());
        Ok(Some(interface))
    }

    /// Ensure the management address exists, sits on `interface`, and is
    /// the device's primary IP for its family.
    pub fn ensure_primary_ip(
        &mut self,
        device: &Device,
        interface: Option<&Interface>,
    ) -> Result<Option<IpAddress>, OnboardError> {
        let store = self.store;
        self.primary_ip = None;

        let Some(interface) = interface else {
            if let (Some(ip), Some(_)) = (self.mgmt_ip()?, self.facts.mgmt_prefix_len) {
                warn!(
                    %ip,
                    device = %device.name,
                    "management address has no interface, skipping primary IP"
                );
            }
            return Ok(None);
        };
        let Some((address, status)) = self.management_address()? else {
            debug!(device = %device.name, "no management address, skipping primary IP");
            return Ok(None);
        };

        let mut ip_address = match store.find_ip_address(&address)? {
            Some(found) => {
                debug!(%address, "reusing IP address");
                found
            }
            None => create_or_adopt(
                || {
                    store
                        .create_ip_address(NewIpAddress {
                            address,
                            status: status.name.clone(),
                        })
                        .inspect(|a| info!(address = %a.address, "created IP address"))
                },
                || Ok(store.find_ip_address(&address)?),
            )?,
        };

        if ip_address.assigned_interface.as_ref() != Some(&interface.id) {
            info!(%address, interface = %interface.name, "assigning IP address");
            ip_address = store.assign_ip_to_interface(&ip_address.id, &interface.id)?;
        }

        let updated = store.set_device_primary_ip(&device.id, &ip_address.id)?;
        debug!(device = %updated.name, %address, "set primary IP");

        self.device = Some(updated);
        self.primary_ip = Some(ip_address.clone());
        Ok(Some(ip_address))
    }

    /// Run every step in order and report what was resolved.
    ///
    /// Creation of each record kind follows the configured create policy;
    /// the interface and primary-IP steps only run when management
    /// interface creation is enabled.
    pub fn ensure_device(&mut self) -> Result<OnboardingResult, OnboardError> {
        let create = self.config.create;

        self.ensure_onboarded_device()?;
        let site = self.ensure_device_site()?;
        self.check_write_inputs()?;
        let manufacturer = self.ensure_device_manufacturer(create.manufacturer)?;
        let device_type = self.ensure_device_type(&manufacturer, create.device_type)?;
        let device_role = self.ensure_device_role(create.device_role)?;
        let platform = self.ensure_device_platform(create.platform)?;

        let deps = DeviceDependencies::new(&site, &device_type, &device_role, platform.as_ref());
        let device = self.ensure_device_instance(&deps)?;

        let (management_interface, primary_ip) = if create.management_interface {
            let interface = self.ensure_interface(&device)?;
            let primary_ip = self.ensure_primary_ip(&device, interface.as_ref())?;
            (interface, primary_ip)
        } else {
            self.management_interface = None;
            self.primary_ip = None;
            (None, None)
        };

        let device = self.device.clone().unwrap_or(device);
        info!(
            device = %device.name,
            site = %site.slug,
            created = self.device_created,
            "device onboarded"
        );

        Ok(OnboardingResult {
            site,
            manufacturer: self.manufacturer.clone().unwrap_or(manufacturer),
            device_type,
            device_role,
            platform,
            device,
            device_created: self.device_created,
            management_interface,
            primary_ip,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn strategy(&self) -> MatchStrategy {
        self.config.object_match_strategy
    }

    /// Validate the configured statuses and the management address before
    /// the first write, so a bad value cannot leave a device without its
    /// interface or primary IP.
    fn check_write_inputs(&self) -> Result<(), OnboardError> {
        resolve_status(
            self.store,
            RecordKind::Device,
            "device",
            &self.config.default_device_status,
        )?;
        if self.config.create.management_interface
            && non_empty(self.facts.mgmt_interface.as_deref()).is_some()
        {
            self.management_address()?;
        }
        Ok(())
    }

    /// The management address with its prefix, and the status a newly
    /// created address gets. `None` when either part was not discovered.
    fn management_address(&self) -> Result<Option<(InterfaceAddress, Status)>, OnboardError> {
        let (Some(ip), Some(prefix_len)) = (self.mgmt_ip()?, self.facts.mgmt_prefix_len) else {
            return Ok(None);
        };
        let address = InterfaceAddress::new(ip, prefix_len)
            .map_err(|e| OnboardError::general(e.to_string()))?;
        let status = resolve_status(
            self.store,
            RecordKind::IpAddress,
            "IP address",
            &self.config.default_ip_status,
        )?;
        Ok(Some((address, status)))
    }

    fn mgmt_ip(&self) -> Result<Option<IpAddr>, OnboardError> {
        non_empty(self.facts.mgmt_ip.as_deref())
            .map(|raw| {
                raw.parse::<IpAddr>().map_err(|_| {
                    OnboardError::general(format!("invalid management IP address: {raw}"))
                })
            })
            .transpose()
    }

    /// Strict: `(name, site)`. Loose: `(name, site)`, then serial.
    fn find_existing_device(&self, site: &Site) -> Result<Option<Device>, OnboardError> {
        let store = self.store;
        let hostname = self.facts.hostname.trim();
        let mut criteria = vec![DeviceQuery::NameInSite {
            name: hostname,
            site: &site.id,
        }];
        if let Some(serial) = non_empty(self.facts.serial.as_deref()) {
            criteria.push(DeviceQuery::Serial(serial));
        }
        first_match(self.strategy(), "devices", &criteria, |q| store.find_devices(q))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Models with characters a slug cannot carry get their spaces dashed.
fn normalize_model(model: &str) -> String {
    if model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return model.to_owned();
    }
    let normalized = model.replace(' ', "-");
    warn!(model, normalized = %normalized, "device model is not sluggable");
    normalized
}
