// ── Discovered facts ──
//
// The flat payload produced by whatever interrogated the device. Only
// hostname, vendor and site are mandatory; everything else degrades
// gracefully when absent.

use serde::{Deserialize, Serialize};

/// Facts discovered about one network device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFacts {
    pub hostname: String,
    pub vendor: String,
    pub site: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Role slug or name; the configured default role applies when absent.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub role_color: Option<String>,
    /// Explicit device-type slug, overriding the model for lookup.
    #[serde(default)]
    pub device_type: Option<String>,
    /// Explicit platform slug, overriding the driver translation.
    #[serde(default)]
    pub platform: Option<String>,
    /// Driver / platform detection string (netmiko device type).
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub mgmt_ip: Option<String>,
    #[serde(default)]
    pub mgmt_prefix_len: Option<u8>,
    #[serde(default)]
    pub mgmt_interface: Option<String>,
}

impl DiscoveredFacts {
    pub fn new(
        hostname: impl Into<String>,
        vendor: impl Into<String>,
        site: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            vendor: vendor.into(),
            site: site.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_role_color(mut self, color: impl Into<String>) -> Self {
        self.role_color = Some(color.into());
        self
    }

    pub fn with_device_type(mut self, slug: impl Into<String>) -> Self {
        self.device_type = Some(slug.into());
        self
    }

    pub fn with_platform(mut self, slug: impl Into<String>) -> Self {
        self.platform = Some(slug.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn with_mgmt_ip(mut self, ip: impl Into<String>, prefix_len: u8) -> Self {
        self.mgmt_ip = Some(ip.into());
        self.mgmt_prefix_len = Some(prefix_len);
        self
    }

    pub fn with_mgmt_interface(mut self, name: impl Into<String>) -> Self {
        self.mgmt_interface = Some(name.into());
        self
    }
}
