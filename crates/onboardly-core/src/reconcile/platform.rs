// ── Platform naming ──
//
// Translating a driver detection string into a platform name and a
// napalm driver tag.

use crate::config::ReconcilerConfig;
use crate::facts::DiscoveredFacts;
use crate::model::{Platform, Slug};

/// Platform name for a set of facts: explicit slug, else the configured
/// mapping of the driver, else the raw driver string.
pub(crate) fn platform_name(facts: &DiscoveredFacts, config: &ReconcilerConfig) -> Option<String> {
    if let Some(explicit) = facts.platform.as_deref().filter(|p| !p.trim().is_empty()) {
        return Some(explicit.to_owned());
    }
    let driver = facts.driver.as_deref().filter(|d| !d.trim().is_empty())?;
    Some(
        config
            .platform_map
            .get(driver)
            .cloned()
            .unwrap_or_else(|| driver.to_owned()),
    )
}

/// Napalm driver for `driver`.
///
/// A driver already carried by a stored platform keyed by the same string
/// wins over configured overrides, which win over the built-in table.
pub(crate) fn napalm_driver(
    config: &ReconcilerConfig,
    driver: &str,
    existing: &[Platform],
) -> Option<String> {
    let key = Slug::from_name(driver);
    existing
        .iter()
        .find(|p| p.slug == key)
        .and_then(|p| p.napalm_driver.clone())
        .or_else(|| config.napalm_driver_for(driver).map(str::to_owned))
}
