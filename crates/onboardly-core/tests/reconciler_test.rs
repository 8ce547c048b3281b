//! Integration tests for the onboarding reconciler.
//!
//! Every test runs the reconciler against a fresh `MemoryStore`, seeded
//! with a site and whatever records the scenario needs.
#![allow(clippy::unwrap_used)]

use std::thread;

use onboardly_core::store::{
    DeviceFields, NewDeviceRole, NewDeviceType, NewManufacturer, NewPlatform,
};
use onboardly_core::{
    Device, DeviceRole, DeviceType, DiscoveredFacts, FailReason, InterfaceType, InventoryStore,
    Manufacturer, MatchStrategy, MemoryStore, OnboardError, Platform, RecordKind, Reconciler,
    ReconcilerConfig, Site, Slug,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Helpers ─────────────────────────────────────────────────────────

fn config(strategy: MatchStrategy) -> ReconcilerConfig {
    ReconcilerConfig {
        object_match_strategy: strategy,
        ..ReconcilerConfig::default()
    }
}

fn store_with_site() -> (MemoryStore, Site) {
    let store = MemoryStore::new();
    let site = store.add_site("USWEST").unwrap();
    (store, site)
}

fn csr_facts(hostname: &str) -> DiscoveredFacts {
    DiscoveredFacts::new(hostname, "Cisco", "uswest").with_model("CSR1000v")
}

fn full_facts(hostname: &str, serial: &str) -> DiscoveredFacts {
    csr_facts(hostname)
        .with_driver("cisco_ios")
        .with_serial(serial)
        .with_mgmt_ip("192.0.2.10", 24)
        .with_mgmt_interface("GigaEthernet0")
}

fn add_manufacturer(store: &MemoryStore, name: &str) -> Manufacturer {
    store
        .create_manufacturer(NewManufacturer {
            name: name.into(),
            slug: Slug::from_name(name),
        })
        .unwrap()
}

fn add_device_type(
    store: &MemoryStore,
    manufacturer: &Manufacturer,
    model: &str,
    slug: &str,
    part_number: Option<&str>,
) -> DeviceType {
    store
        .create_device_type(NewDeviceType {
            manufacturer: manufacturer.id.clone(),
            model: model.into(),
            slug: Slug::from_name(slug),
            part_number: part_number.map(str::to_owned),
        })
        .unwrap()
}

fn add_role(store: &MemoryStore, name: &str) -> DeviceRole {
    store
        .create_device_role(NewDeviceRole {
            name: name.into(),
            slug: Slug::from_name(name),
            color: "0000ff".parse().unwrap(),
            vm_role: false,
        })
        .unwrap()
}

fn add_platform(store: &MemoryStore, slug: &str, napalm_driver: Option<&str>) -> Platform {
    store
        .create_platform(NewPlatform {
            name: slug.into(),
            slug: Slug::from_name(slug),
            napalm_driver: napalm_driver.map(str::to_owned),
        })
        .unwrap()
}

fn add_device(store: &MemoryStore, site: &Site, name: &str, serial: &str) -> Device {
    let manufacturer = add_manufacturer(store, "Cisco");
    let device_type = add_device_type(store, &manufacturer, "c2960", "c2960", None);
    let role = add_role(store, "switch");
    store
        .create_or_update_device(
            None,
            DeviceFields {
                name: name.into(),
                site: site.id.clone(),
                device_type: device_type.id,
                device_role: role.id,
                platform: None,
                status: Some("Active".into()),
                serial: Some(serial.into()),
            },
        )
        .unwrap()
        .record
}

fn assert_fails(err: &OnboardError, reason: FailReason, message: &str) {
    assert_eq!(err.reason(), reason);
    assert_eq!(err.to_string(), message);
}

// ── Site ────────────────────────────────────────────────────────────

#[test]
fn test_missing_site_fails_before_any_write() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = DiscoveredFacts::new("device1", "Cisco", "nowhere").with_model("CSR1000v");

    let err = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "site not found: nowhere");
    assert_eq!(store.count(RecordKind::Manufacturer), 0);
    assert_eq!(store.count(RecordKind::Device), 0);
}

// ── Manufacturer ────────────────────────────────────────────────────

fn manufacturer_missing(strategy: MatchStrategy) {
    let (store, _) = store_with_site();
    let cfg = config(strategy);
    let mut rec = Reconciler::new(&store, &cfg, csr_facts("device1"));

    let err = rec.ensure_device_manufacturer(false).unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "manufacturer not found: Cisco");
    assert_eq!(store.count(RecordKind::Manufacturer), 0);

    let created = rec.ensure_device_manufacturer(true).unwrap();
    assert_eq!(created.slug.as_str(), "cisco");
    assert_eq!(created.name, "Cisco");
    assert_eq!(rec.manufacturer(), Some(&created));

    let again = rec.ensure_device_manufacturer(true).unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(store.count(RecordKind::Manufacturer), 1);
}

#[test]
fn test_ensure_manufacturer_strict_missing() {
    manufacturer_missing(MatchStrategy::Strict);
}

#[test]
fn test_ensure_manufacturer_loose_missing() {
    manufacturer_missing(MatchStrategy::Loose);
}

#[test]
fn test_manufacturer_is_matched_by_slug_of_vendor() {
    let (store, _) = store_with_site();
    let existing = add_manufacturer(&store, "Juniper Networks");
    let cfg = ReconcilerConfig::default();
    let facts = DiscoveredFacts::new("device1", "juniper networks", "uswest");

    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_manufacturer(false)
        .unwrap();
    assert_eq!(found, existing);
}

#[test]
fn test_accented_vendor_matches_ascii_slug() {
    let (store, _) = store_with_site();
    let existing = store
        .create_manufacturer(NewManufacturer {
            name: "Societe Reseaux".into(),
            slug: Slug::from_name("societe-reseaux"),
        })
        .unwrap();
    let cfg = ReconcilerConfig::default();
    let facts = DiscoveredFacts::new("device1", "Société Réseaux", "uswest");

    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_manufacturer(true)
        .unwrap();
    assert_eq!(found, existing);
    assert_eq!(store.count(RecordKind::Manufacturer), 1);
}

// ── Device type ─────────────────────────────────────────────────────

fn device_type_missing(strategy: MatchStrategy) {
    let (store, _) = store_with_site();
    let manufacturer = add_manufacturer(&store, "Cisco");
    let cfg = config(strategy);
    let mut rec = Reconciler::new(&store, &cfg, csr_facts("device1"));

    let err = rec.ensure_device_type(&manufacturer, false).unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device type not found: CSR1000v");
    assert_eq!(store.count(RecordKind::DeviceType), 0);

    let created = rec.ensure_device_type(&manufacturer, true).unwrap();
    assert_eq!(created.slug.as_str(), "csr1000v");
    assert_eq!(created.model, "CSR1000v");
    assert_eq!(created.manufacturer, manufacturer.id);
}

#[test]
fn test_ensure_device_type_strict_missing() {
    device_type_missing(MatchStrategy::Strict);
}

#[test]
fn test_ensure_device_type_loose_missing() {
    device_type_missing(MatchStrategy::Loose);
}

fn device_type_present(strategy: MatchStrategy) {
    let (store, _) = store_with_site();
    let manufacturer = add_manufacturer(&store, "Cisco");
    let existing = add_device_type(&store, &manufacturer, "CSR1000v", "csr1000v", None);
    let cfg = config(strategy);

    let found = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device_type(&manufacturer, false)
        .unwrap();
    assert_eq!(found, existing);
}

#[test]
fn test_ensure_device_type_strict_present() {
    device_type_present(MatchStrategy::Strict);
}

#[test]
fn test_ensure_device_type_loose_present() {
    device_type_present(MatchStrategy::Loose);
}

#[test]
fn test_device_type_without_model_or_slug_is_a_config_error() {
    let (store, _) = store_with_site();
    let manufacturer = add_manufacturer(&store, "Cisco");
    let cfg = ReconcilerConfig::default();
    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest");

    let err = Reconciler::new(&store, &cfg, facts)
        .ensure_device_type(&manufacturer, true)
        .unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device type not found");
}

#[test]
fn test_explicit_device_type_slug_overrides_model() {
    let (store, _) = store_with_site();
    let manufacturer = add_manufacturer(&store, "Cisco");
    let existing = add_device_type(&store, &manufacturer, "Catalyst 9300", "c9300-48p", None);
    let cfg = config(MatchStrategy::Strict);
    let facts = csr_facts("device1").with_device_type("c9300-48p");

    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_type(&manufacturer, false)
        .unwrap();
    assert_eq!(found.id, existing.id);
}

#[test]
fn test_unsluggable_model_gets_dashes() {
    let (store, _) = store_with_site();
    let manufacturer = add_manufacturer(&store, "Juniper");
    let cfg = ReconcilerConfig::default();
    let facts = DiscoveredFacts::new("device1", "Juniper", "uswest").with_model("MX 480");

    let created = Reconciler::new(&store, &cfg, facts)
        .ensure_device_type(&manufacturer, true)
        .unwrap();
    assert_eq!(created.model, "MX-480");
    assert_eq!(created.slug.as_str(), "mx-480");
}

#[test]
fn test_strict_rejects_device_type_of_other_manufacturer() {
    let (store, _) = store_with_site();
    let cisco = add_manufacturer(&store, "Cisco");
    let juniper = add_manufacturer(&store, "Juniper");
    add_device_type(&store, &juniper, "c2960", "c2960", None);
    let cfg = config(MatchStrategy::Strict);
    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest").with_model("c2960");
    let mut rec = Reconciler::new(&store, &cfg, facts);

    let err = rec.ensure_device_type(&cisco, true).unwrap_err();
    assert_fails(
        &err,
        FailReason::FailConfig,
        "device type c2960 already exists for vendor Juniper",
    );

    let err = rec.ensure_device_type(&cisco, false).unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device type not found: c2960");
    assert_eq!(store.count(RecordKind::DeviceType), 1);
}

#[test]
fn test_loose_trusts_manufacturer_of_matched_device_type() {
    let (store, _) = store_with_site();
    let cisco = add_manufacturer(&store, "Cisco");
    let juniper = add_manufacturer(&store, "Juniper");
    let existing = add_device_type(&store, &juniper, "c2960", "c2960", None);
    let cfg = config(MatchStrategy::Loose);
    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest").with_model("c2960");
    let mut rec = Reconciler::new(&store, &cfg, facts);

    rec.ensure_device_manufacturer(false).unwrap();
    let found = rec.ensure_device_type(&cisco, false).unwrap();
    assert_eq!(found.id, existing.id);
    assert_eq!(rec.manufacturer().unwrap().id, juniper.id);
}

#[test]
fn test_loose_falls_back_to_model_and_part_number() {
    let (store, _) = store_with_site();
    let cisco = add_manufacturer(&store, "Cisco");
    let by_model = add_device_type(&store, &cisco, "CSR1000v", "cisco-csr", None);
    let by_part = add_device_type(
        &store,
        &cisco,
        "Catalyst Switch",
        "cat-sw",
        Some("WS-C2960-24TT-L"),
    );
    let cfg = config(MatchStrategy::Loose);

    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest").with_model("csr1000v");
    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_type(&cisco, false)
        .unwrap();
    assert_eq!(found.id, by_model.id);

    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest").with_model("ws-c2960-24tt-l");
    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_type(&cisco, false)
        .unwrap();
    assert_eq!(found.id, by_part.id);
}

#[test]
fn test_strict_ignores_model_and_part_number() {
    let (store, _) = store_with_site();
    let cisco = add_manufacturer(&store, "Cisco");
    add_device_type(&store, &cisco, "CSR1000v", "cisco-csr", None);
    let cfg = config(MatchStrategy::Strict);
    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest").with_model("CSR1000v");
    let mut rec = Reconciler::new(&store, &cfg, facts);

    let err = rec.ensure_device_type(&cisco, false).unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device type not found: CSR1000v");

    rec.ensure_device_type(&cisco, true).unwrap();
    assert_eq!(store.count(RecordKind::DeviceType), 2);
}

#[test]
fn test_ambiguous_model_is_a_general_error() {
    let (store, _) = store_with_site();
    let cisco = add_manufacturer(&store, "Cisco");
    add_device_type(&store, &cisco, "CSR", "csr-a", None);
    add_device_type(&store, &cisco, "csr", "csr-b", None);
    let cfg = config(MatchStrategy::Loose);
    let facts = DiscoveredFacts::new("device1", "Cisco", "uswest").with_model("CSR");

    let err = Reconciler::new(&store, &cfg, facts)
        .ensure_device_type(&cisco, true)
        .unwrap_err();
    assert_fails(
        &err,
        FailReason::FailGeneral,
        "multiple device types found searching on model=CSR",
    );
}

#[test]
fn test_disabled_device_type_creation_aborts_before_device_write() {
    let (store, _) = store_with_site();
    add_manufacturer(&store, "Cisco");
    let mut cfg = ReconcilerConfig::default();
    cfg.create.device_type = false;

    let err = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device type not found: CSR1000v");
    assert_eq!(store.count(RecordKind::DeviceType), 0);
    assert_eq!(store.count(RecordKind::DeviceRole), 0);
    assert_eq!(store.count(RecordKind::Device), 0);
}

// ── Device role ─────────────────────────────────────────────────────

#[test]
fn test_ensure_device_role_not_exist() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_role("mytestrole")
        .with_role_color("#00FF00");
    let mut rec = Reconciler::new(&store, &cfg, facts);

    let err = rec.ensure_device_role(false).unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device role not found: mytestrole");

    let created = rec.ensure_device_role(true).unwrap();
    assert_eq!(created.slug.as_str(), "mytestrole");
    assert_eq!(created.color.as_str(), "00ff00");
    assert!(!created.vm_role);
}

#[test]
fn test_ensure_device_role_exist() {
    let (store, _) = store_with_site();
    let existing = add_role(&store, "mytestrole");
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_role("mytestrole")
        .with_role_color("ff0000");

    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_role(false)
        .unwrap();
    assert_eq!(found, existing);
    assert_eq!(found.color.as_str(), "0000ff");
}

#[test]
fn test_ensure_device_role_assigned() {
    let (store, _) = store_with_site();
    let existing = add_role(&store, "mytestrole");
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1").with_role("mytestrole");

    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_role(true)
        .unwrap();
    assert_eq!(found, existing);
    assert_eq!(store.count(RecordKind::DeviceRole), 1);
}

#[test]
fn test_default_role_applies_without_role_fact() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let created = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device_role(true)
        .unwrap();
    assert_eq!(created.slug.as_str(), "network");
    assert_eq!(created.color.as_str(), "ff0000");
}

#[test]
fn test_invalid_role_color_is_a_general_error() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_role("edge")
        .with_role_color("notacolor");

    let err = Reconciler::new(&store, &cfg, facts)
        .ensure_device_role(true)
        .unwrap_err();
    assert_fails(
        &err,
        FailReason::FailGeneral,
        "invalid color 'notacolor': expected six hex digits",
    );
    assert_eq!(store.count(RecordKind::DeviceRole), 0);
}

// ── Platform ────────────────────────────────────────────────────────

#[test]
fn test_ensure_device_platform_missing() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1").with_driver("cisco_ios");
    let mut rec = Reconciler::new(&store, &cfg, facts);

    let err = rec.ensure_device_platform(false).unwrap_err();
    assert_fails(&err, FailReason::FailConfig, "device platform not found: cisco_ios");

    let created = rec.ensure_device_platform(true).unwrap().unwrap();
    assert_eq!(created.slug.as_str(), "cisco_ios");
    assert_eq!(created.napalm_driver.as_deref(), Some("ios"));
}

#[test]
fn test_ensure_platform_present() {
    let (store, _) = store_with_site();
    let existing = add_platform(&store, "cisco_ios", None);
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1").with_platform("cisco_ios");

    let found = Reconciler::new(&store, &cfg, facts)
        .ensure_device_platform(false)
        .unwrap();
    assert_eq!(found, Some(existing));
}

#[test]
fn test_platform_map() {
    let (store, _) = store_with_site();
    let mut cfg = ReconcilerConfig::default();
    cfg.platform_map.insert("cisco_ios".into(), "ios".into());
    let facts = csr_facts("device1").with_driver("cisco_ios");

    let created = Reconciler::new(&store, &cfg, facts)
        .ensure_device_platform(true)
        .unwrap()
        .unwrap();
    assert_eq!(created.slug.as_str(), "ios");
    assert_eq!(created.napalm_driver.as_deref(), Some("ios"));
}

#[test]
fn test_napalm_driver_from_stored_platform() {
    let (store, _) = store_with_site();
    add_platform(&store, "cisco_ios", Some("ios_custom"));
    let mut cfg = ReconcilerConfig::default();
    cfg.platform_map.insert("cisco_ios".into(), "cisco-ios-xe".into());
    let facts = csr_facts("device1").with_driver("cisco_ios");

    let created = Reconciler::new(&store, &cfg, facts)
        .ensure_device_platform(true)
        .unwrap()
        .unwrap();
    assert_eq!(created.slug.as_str(), "cisco-ios-xe");
    assert_eq!(created.napalm_driver.as_deref(), Some("ios_custom"));
}

#[test]
fn test_no_platform_information_leaves_device_without_platform() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let result = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device()
        .unwrap();
    assert_eq!(result.platform, None);
    assert_eq!(result.device.platform, None);
    assert_eq!(store.count(RecordKind::Platform), 0);
}

// ── Device instance ─────────────────────────────────────────────────

#[test]
fn test_ensure_device_instance_not_exist() {
    let (store, site) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let result = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    assert!(result.device_created);
    assert_eq!(result.device.name, "device1");
    assert_eq!(result.device.site, site.id);
    assert_eq!(result.device.status, "Active");
    assert_eq!(result.device.serial.as_deref(), Some("123456"));
    assert_eq!(result.platform.as_ref().unwrap().slug.as_str(), "cisco_ios");
    assert_eq!(result.device.platform, result.platform.map(|p| p.id));
    assert_eq!(result.device_role.slug.as_str(), "network");
}

#[test]
fn test_ensure_device_instance_exist() {
    let (store, site) = store_with_site();
    let existing = add_device(&store, &site, "device1", "987654");
    let cfg = ReconcilerConfig::default();

    let result = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    assert!(!result.device_created);
    assert_eq!(result.device.id, existing.id);
    assert_eq!(result.device.name, "device1");
    assert_eq!(result.device.serial.as_deref(), Some("123456"));
    assert_eq!(result.platform.unwrap().slug.as_str(), "cisco_ios");
    assert_eq!(store.count(RecordKind::Device), 1);
}

#[test]
fn test_loose_matches_device_by_serial() {
    let (store, site) = store_with_site();
    let existing = add_device(&store, &site, "old-name", "SN1");
    let cfg = config(MatchStrategy::Loose);

    let result = Reconciler::new(&store, &cfg, csr_facts("new-name").with_serial("SN1"))
        .ensure_device()
        .unwrap();
    assert!(!result.device_created);
    assert_eq!(result.device.id, existing.id);
    assert_eq!(result.device.name, "new-name");
}

#[test]
fn test_strict_creates_new_device_despite_serial_match() {
    let (store, site) = store_with_site();
    add_device(&store, &site, "old-name", "SN1");
    let cfg = config(MatchStrategy::Strict);

    let result = Reconciler::new(&store, &cfg, csr_facts("new-name").with_serial("SN1"))
        .ensure_device()
        .unwrap();
    assert!(result.device_created);
    assert_eq!(store.count(RecordKind::Device), 2);
}

#[test]
fn test_device_matched_by_management_ip_is_renamed() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let first = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    let mut rec = Reconciler::new(&store, &cfg, full_facts("device1-renamed", "123456"));
    let second = rec.ensure_device().unwrap();

    assert_eq!(rec.onboarded_device().unwrap().id, first.device.id);
    assert_eq!(second.device.id, first.device.id);
    assert_eq!(second.device.name, "device1-renamed");
    assert_eq!(store.count(RecordKind::Device), 1);
    assert_eq!(store.count(RecordKind::Interface), 1);
    assert_eq!(store.count(RecordKind::IpAddress), 1);
}

#[test]
fn test_skip_manufacturer_and_device_type_on_update() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let first = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    let skip = ReconcilerConfig {
        skip_manufacturer_on_update: true,
        skip_device_type_on_update: true,
        ..ReconcilerConfig::default()
    };
    let facts = DiscoveredFacts::new("device1", "Juniper", "uswest")
        .with_model("MX480")
        .with_mgmt_ip("192.0.2.10", 24)
        .with_mgmt_interface("GigaEthernet0");
    let second = Reconciler::new(&store, &skip, facts).ensure_device().unwrap();

    assert_eq!(second.manufacturer.id, first.manufacturer.id);
    assert_eq!(second.device_type.id, first.device_type.id);
    assert_eq!(second.device.device_type, first.device_type.id);
    assert_eq!(store.count(RecordKind::Manufacturer), 1);
    assert_eq!(store.count(RecordKind::DeviceType), 1);
}

#[test]
fn test_status_is_overwritten_unless_preserved() {
    let (store, _) = store_with_site();
    let planned = ReconcilerConfig {
        default_device_status: "Planned".into(),
        ..ReconcilerConfig::default()
    };
    let first = Reconciler::new(&store, &planned, csr_facts("device1"))
        .ensure_device()
        .unwrap();
    assert_eq!(first.device.status, "Planned");

    let preserve = ReconcilerConfig {
        preserve_status_on_update: true,
        ..ReconcilerConfig::default()
    };
    let kept = Reconciler::new(&store, &preserve, csr_facts("device1"))
        .ensure_device()
        .unwrap();
    assert_eq!(kept.device.status, "Planned");

    let overwritten = Reconciler::new(&store, &ReconcilerConfig::default(), csr_facts("device1"))
        .ensure_device()
        .unwrap();
    assert_eq!(overwritten.device.id, first.device.id);
    assert_eq!(overwritten.device.status, "Active");
}

#[test]
fn test_unknown_device_status_is_a_general_error() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig {
        default_device_status: "Bogus".into(),
        ..ReconcilerConfig::default()
    };

    let err = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device()
        .unwrap_err();
    assert_fails(
        &err,
        FailReason::FailGeneral,
        "could not find existing device status: Bogus",
    );
    assert_eq!(store.count(RecordKind::Manufacturer), 0);
    assert_eq!(store.count(RecordKind::Device), 0);
}

#[test]
fn test_invalid_management_ip_is_a_general_error() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1").with_mgmt_ip("not-an-ip", 24);

    let err = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap_err();
    assert_fails(
        &err,
        FailReason::FailGeneral,
        "invalid management IP address: not-an-ip",
    );
}

// ── Interface and primary IP ────────────────────────────────────────

#[test]
fn test_ensure_interface_not_exist() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_mgmt_ip("192.0.2.10", 24)
        .with_mgmt_interface("ge-0/0/0");

    let mut rec = Reconciler::new(&store, &cfg, facts);
    let result = rec.ensure_device().unwrap();

    let interface = result.management_interface.unwrap();
    assert_eq!(interface.name, "ge-0/0/0");
    assert_eq!(interface.kind, InterfaceType::Other);
    assert_eq!(interface.device, result.device.id);
    assert_eq!(rec.management_interface(), Some(&interface));
}

#[test]
fn test_ensure_interface_exist() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1").with_mgmt_interface("ge-0/0/0");

    let first = Reconciler::new(&store, &cfg, facts.clone()).ensure_device().unwrap();
    let second = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();

    assert_eq!(second.management_interface, first.management_interface);
    assert_eq!(store.count(RecordKind::Interface), 1);
}

#[test]
fn test_ensure_primary_ip_not_exist() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_mgmt_ip("192.0.2.10", 24)
        .with_mgmt_interface("ge-0/0/0");

    let result = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();

    let ip = result.primary_ip.unwrap();
    let interface = result.management_interface.unwrap();
    assert_eq!(ip.address.to_string(), "192.0.2.10/24");
    assert_eq!(ip.status, "Active");
    assert_eq!(ip.assigned_interface, Some(interface.id));
    assert_eq!(result.device.primary_ip4, Some(ip.id.clone()));
    assert_eq!(store.get_device(&result.device.id).unwrap().primary_ip4, Some(ip.id));
}

#[test]
fn test_ipv6_management_address_sets_primary_ip6() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_mgmt_ip("2001:db8::10", 64)
        .with_mgmt_interface("mgmt0");

    let result = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();

    assert_eq!(result.device.primary_ip4, None);
    assert_eq!(result.device.primary_ip6, result.primary_ip.map(|ip| ip.id));
}

#[test]
fn test_management_address_without_interface_is_skipped() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1").with_mgmt_ip("192.0.2.10", 24);

    let result = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();

    assert_eq!(result.management_interface, None);
    assert_eq!(result.primary_ip, None);
    assert_eq!(result.device.primary_ip4, None);
    assert_eq!(store.count(RecordKind::IpAddress), 0);
}

#[test]
fn test_management_interface_creation_disabled() {
    let (store, _) = store_with_site();
    let mut cfg = ReconcilerConfig::default();
    cfg.create.management_interface = false;

    let result = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    assert_eq!(result.management_interface, None);
    assert_eq!(result.primary_ip, None);
    assert_eq!(store.count(RecordKind::Interface), 0);
    assert_eq!(store.count(RecordKind::IpAddress), 0);
}

#[test]
fn test_unknown_ip_status_is_a_general_error() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig {
        default_ip_status: "Planned".into(),
        ..ReconcilerConfig::default()
    };

    let err = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap_err();
    assert_fails(
        &err,
        FailReason::FailGeneral,
        "could not find existing IP address status: Planned",
    );
    assert_eq!(store.count(RecordKind::Manufacturer), 0);
    assert_eq!(store.count(RecordKind::Device), 0);
    assert_eq!(store.count(RecordKind::Interface), 0);
    assert_eq!(store.count(RecordKind::IpAddress), 0);
}

#[test]
fn test_out_of_range_prefix_fails_before_any_write() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let facts = csr_facts("device1")
        .with_mgmt_ip("192.0.2.10", 40)
        .with_mgmt_interface("GigaEthernet0");

    let err = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap_err();
    assert_eq!(err.reason(), FailReason::FailGeneral);
    assert_eq!(store.count(RecordKind::Manufacturer), 0);
    assert_eq!(store.count(RecordKind::DeviceType), 0);
    assert_eq!(store.count(RecordKind::Device), 0);
    assert_eq!(store.count(RecordKind::Interface), 0);
}

#[test]
fn test_ip_inputs_are_not_checked_without_interface_creation() {
    let (store, _) = store_with_site();
    let mut cfg = ReconcilerConfig {
        default_ip_status: "Planned".into(),
        ..ReconcilerConfig::default()
    };
    cfg.create.management_interface = false;
    let facts = csr_facts("device1").with_mgmt_ip("192.0.2.10", 40);

    let result = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();
    assert_eq!(result.primary_ip, None);
    assert_eq!(store.count(RecordKind::Device), 1);
}

// ── Whole pipeline ──────────────────────────────────────────────────

#[test]
fn test_new_device_end_to_end() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let result = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    assert!(result.device_created);
    assert_eq!(result.manufacturer.slug.as_str(), "cisco");
    assert_eq!(result.device_type.slug.as_str(), "csr1000v");
    assert_eq!(result.device.status, "Active");
    assert_eq!(result.device.serial.as_deref(), Some("123456"));
    assert_eq!(result.platform.as_ref().unwrap().slug.as_str(), "cisco_ios");
    assert_eq!(result.management_interface.as_ref().unwrap().name, "GigaEthernet0");
    assert_eq!(
        result.device.primary_ip4.as_ref(),
        result.primary_ip.as_ref().map(|ip| &ip.id)
    );
    assert_eq!(store.count(RecordKind::Device), 1);
    assert_eq!(store.count(RecordKind::Interface), 1);
    assert_eq!(store.count(RecordKind::IpAddress), 1);
}

#[test]
fn test_rerun_reuses_every_record() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let first = Reconciler::new(&store, &cfg, full_facts("device1", "123456"))
        .ensure_device()
        .unwrap();

    let facts = full_facts("device1", "654321")
        .with_role("core")
        .with_platform("ios-xe");
    let second = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();

    assert!(!second.device_created);
    assert_eq!(second.device.id, first.device.id);
    assert_eq!(second.manufacturer.id, first.manufacturer.id);
    assert_eq!(second.device_type.id, first.device_type.id);
    assert_eq!(second.device.serial.as_deref(), Some("654321"));
    assert_eq!(second.device.device_role, second.device_role.id);
    assert_eq!(second.device_role.slug.as_str(), "core");
    assert_eq!(second.platform.as_ref().unwrap().slug.as_str(), "ios-xe");
    assert_eq!(
        second.management_interface.as_ref().map(|i| &i.id),
        first.management_interface.as_ref().map(|i| &i.id)
    );
    assert_eq!(
        second.primary_ip.as_ref().map(|ip| &ip.id),
        first.primary_ip.as_ref().map(|ip| &ip.id)
    );
    assert_eq!(store.count(RecordKind::Manufacturer), 1);
    assert_eq!(store.count(RecordKind::DeviceType), 1);
    assert_eq!(store.count(RecordKind::Device), 1);
}

#[test]
fn test_ensure_custom_fields() {
    let (store, _) = store_with_site();
    store.define_custom_field(RecordKind::Device, "cf_device", json!(false));
    store.define_custom_field(RecordKind::Platform, "cf_platform", json!(true));
    store.define_custom_field(RecordKind::DeviceType, "cf_devicetype", json!(5));
    store.define_custom_field(RecordKind::DeviceRole, "cf_devicerole", json!(10));
    store.define_custom_field(RecordKind::Manufacturer, "cf_manufacturer", json!("Foobar!"));
    store.define_custom_field(RecordKind::Interface, "cf_interface", json!("2016-06-23"));
    store.define_custom_field(RecordKind::IpAddress, "cf_ipaddress", json!("http://example.com/"));
    let cfg = ReconcilerConfig::default();
    let facts = full_facts("device1", "123456").with_mgmt_interface("Management0");

    let result = Reconciler::new(&store, &cfg, facts.clone()).ensure_device().unwrap();

    assert_eq!(result.device.custom_fields["cf_device"], json!(false));
    assert_eq!(result.platform.as_ref().unwrap().custom_fields["cf_platform"], json!(true));
    assert_eq!(result.device_type.custom_fields["cf_devicetype"], json!(5));
    assert_eq!(result.device_role.custom_fields["cf_devicerole"], json!(10));
    assert_eq!(result.manufacturer.custom_fields["cf_manufacturer"], json!("Foobar!"));
    let interface = result.management_interface.unwrap();
    assert_eq!(interface.name, "Management0");
    assert_eq!(interface.custom_fields["cf_interface"], json!("2016-06-23"));
    assert_eq!(
        result.primary_ip.unwrap().custom_fields["cf_ipaddress"],
        json!("http://example.com/")
    );

    store
        .set_custom_field(RecordKind::Device, &result.device.id, "cf_device", json!(true))
        .unwrap();
    let rerun = Reconciler::new(&store, &cfg, facts).ensure_device().unwrap();
    assert_eq!(rerun.device.custom_fields["cf_device"], json!(true));
    assert_eq!(rerun.manufacturer.custom_fields["cf_manufacturer"], json!("Foobar!"));
}

#[test]
fn test_device_update_fills_defaults_defined_later() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();
    let first = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device()
        .unwrap();
    assert!(first.device.custom_fields.is_empty());

    store.define_custom_field(RecordKind::Device, "cf_owner", json!("noc"));
    let second = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device()
        .unwrap();
    assert_eq!(second.device.custom_fields["cf_owner"], json!("noc"));
}

#[test]
fn test_result_serializes_for_reporting() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let result = Reconciler::new(&store, &cfg, csr_facts("device1"))
        .ensure_device()
        .unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["device_created"], json!(true));
    assert_eq!(value["device"]["name"], json!("device1"));
    assert_eq!(value["site"]["slug"], json!("uswest"));
    assert!(value.get("platform").is_none());
    assert!(value.get("primary_ip").is_none());
}

// ── Concurrency ─────────────────────────────────────────────────────

#[test]
fn test_concurrent_onboarding_shares_records() {
    let (store, _) = store_with_site();
    let cfg = ReconcilerConfig::default();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = &store;
                let cfg = &cfg;
                s.spawn(move || {
                    let facts = csr_facts(&format!("edge{i}"))
                        .with_driver("cisco_ios")
                        .with_role("edge")
                        .with_mgmt_ip(format!("192.0.2.{}", 10 + i), 24)
                        .with_mgmt_interface("mgmt0");
                    Reconciler::new(store, cfg, facts).ensure_device()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|r| r.device_created));
    assert!(
        results
            .iter()
            .all(|r| r.manufacturer.id == results[0].manufacturer.id)
    );
    assert_eq!(store.count(RecordKind::Manufacturer), 1);
    assert_eq!(store.count(RecordKind::DeviceType), 1);
    assert_eq!(store.count(RecordKind::DeviceRole), 1);
    assert_eq!(store.count(RecordKind::Platform), 1);
    assert_eq!(store.count(RecordKind::Device), 8);
    assert_eq!(store.count(RecordKind::Interface), 8);
    assert_eq!(store.count(RecordKind::IpAddress), 8);
}
