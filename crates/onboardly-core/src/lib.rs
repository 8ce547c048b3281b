//! Reconciliation engine that onboards discovered network devices into an
//! inventory of record.
//!
//! Given the facts discovered about one device (hostname, vendor, model,
//! driver, serial, management address), the engine makes the inventory
//! reflect them, reusing existing records and creating missing ones as the
//! configuration allows:
//!
//! - **[`Reconciler`]**: Runs the onboarding steps (site, manufacturer,
//!   device type, role, platform, device, management interface, primary
//!   IP). [`Reconciler::ensure_device()`] runs the full pipeline and returns
//!   an [`OnboardingResult`]. Re-running converges on the same records.
//!
//! - **[`InventoryStore`]**: The synchronous CRUD boundary to the system of
//!   record. Creates are atomic insert-if-absent on each record's unique
//!   key, so concurrent onboardings sharing a vendor or model agree on one
//!   record.
//!
//! - **[`MemoryStore`]**: A complete thread-safe in-process store built on
//!   `DashMap`, with seeding helpers for sites, statuses and custom fields.
//!
//! - **[`ReconcilerConfig`]**: Match strategy (`strict` / `loose`), default
//!   role and statuses, platform and napalm driver maps, create policy.
//!
//! - **Domain model** ([`model`]): Canonical record types (`Site`,
//!   `Manufacturer`, `DeviceType`, `Device`, `Interface`, `IpAddress`, ...)
//!   keyed by [`RecordId`] and addressed by [`Slug`].

pub mod config;
pub mod error;
pub mod facts;
pub mod model;
pub mod reconcile;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CreatePolicy, MatchStrategy, ReconcilerConfig};
pub use error::{FailReason, OnboardError, StoreError};
pub use facts::DiscoveredFacts;
pub use reconcile::{DeviceDependencies, OnboardingResult, Reconciler};
pub use store::{DeviceQuery, DeviceTypeQuery, InventoryStore, MemoryStore, Upserted};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Color,
    CustomFields,
    Device,
    DeviceRole,
    DeviceType,
    Interface,
    InterfaceAddress,
    InterfaceType,
    IpAddress,
    IpFamily,
    Manufacturer,
    Platform,
    RecordId,
    RecordKind,
    Site,
    Slug,
    Status,
};
