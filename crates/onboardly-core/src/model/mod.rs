// ── Domain model ──
//
// Canonical inventory record types. All records are owned by the
// inventory store; the reconciler only holds copies bound during a run.

pub mod common;
pub mod dcim;
pub mod ipam;
pub mod record_id;
pub mod slug;

pub use common::{Color, CustomFields, InvalidColor, RecordKind, Status};
pub use dcim::{
    Device, DeviceRole, DeviceType, Interface, InterfaceType, Manufacturer, Platform, Site,
};
pub use ipam::{InterfaceAddress, InvalidAddress, IpAddress, IpFamily};
pub use record_id::RecordId;
pub use slug::Slug;
