// ── Runtime reconciliation configuration ──
//
// These types describe *how* discovered facts are matched against the
// inventory. They never touch disk: `onboardly-config` (or a test) builds
// a `ReconcilerConfig` and hands it to the reconciler.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::Color;

/// Netmiko device types with a well-known napalm driver.
const NETMIKO_TO_NAPALM_STATIC: &[(&str, &str)] = &[
    ("cisco_ios", "ios"),
    ("cisco_xe", "ios"),
    ("cisco_nxos", "nxos"),
    ("cisco_xr", "iosxr"),
    ("juniper_junos", "junos"),
    ("arista_eos", "eos"),
];

/// How existing records are matched during lookup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchStrategy {
    /// Only the full natural key matches; never crosses scope boundaries.
    Strict,
    /// Falls back through secondary identifiers, reusing the first match.
    #[default]
    Loose,
}

/// Which record kinds may be created when no match exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct CreatePolicy {
    pub manufacturer: bool,
    pub device_type: bool,
    pub device_role: bool,
    pub platform: bool,
    /// Gates both the management interface and the primary IP steps.
    pub management_interface: bool,
}

impl Default for CreatePolicy {
    fn default() -> Self {
        Self {
            manufacturer: true,
            device_type: true,
            device_role: true,
            platform: true,
            management_interface: true,
        }
    }
}

/// Configuration for one or more reconciliation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReconcilerConfig {
    pub object_match_strategy: MatchStrategy,
    /// Role slug used when the facts carry none.
    pub default_device_role: String,
    pub default_device_role_color: Color,
    /// Status given to newly created devices.
    pub default_device_status: String,
    /// Status given to newly created IP addresses.
    pub default_ip_status: String,
    /// Driver string → canonical platform name.
    pub platform_map: HashMap<String, String>,
    /// Driver string → napalm driver, layered over the built-in table.
    pub napalm_driver_map: HashMap<String, String>,
    pub create: CreatePolicy,
    /// Keep the manufacturer of a device matched by management IP.
    pub skip_manufacturer_on_update: bool,
    /// Keep the device type of a device matched by management IP.
    pub skip_device_type_on_update: bool,
    /// Leave the status of an existing device untouched on update.
    pub preserve_status_on_update: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            object_match_strategy: MatchStrategy::default(),
            default_device_role: "network".into(),
            default_device_role_color: Color::default_role_color(),
            default_device_status: "Active".into(),
            default_ip_status: "Active".into(),
            platform_map: HashMap::new(),
            napalm_driver_map: HashMap::new(),
            create: CreatePolicy::default(),
            skip_manufacturer_on_update: false,
            skip_device_type_on_update: false,
            preserve_status_on_update: false,
        }
    }
}

impl ReconcilerConfig {
    /// Napalm driver for a driver string: config overrides first, then the
    /// built-in table.
    pub fn napalm_driver_for(&self, driver: &str) -> Option<&str> {
        self.napalm_driver_map.get(driver).map(String::as_str).or_else(|| {
            NETMIKO_TO_NAPALM_STATIC
                .iter()
                .find(|(netmiko, _)| *netmiko == driver)
                .map(|(_, napalm)| *napalm)
        })
    }
}
