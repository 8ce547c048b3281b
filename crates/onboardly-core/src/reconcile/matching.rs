// ── Strategy-driven lookups ──
//
// A lookup is an ordered list of criteria. Strict matching evaluates only
// the first (the full natural key); loose matching walks the whole list
// and reuses the first hit.

use std::fmt::Display;

use tracing::debug;

use crate::config::MatchStrategy;
use crate::error::{OnboardError, StoreError};
use crate::model::{RecordKind, Slug, Status};
use crate::store::InventoryStore;

/// Return the first record matched by `criteria` under `strategy`.
///
/// A criterion matching more than one record is an error, even when a
/// later criterion would have been unambiguous.
pub(crate) fn first_match<Q, T>(
    strategy: MatchStrategy,
    label: &str,
    criteria: &[Q],
    mut find: impl FnMut(&Q) -> Result<Vec<T>, StoreError>,
) -> Result<Option<T>, OnboardError>
where
    Q: Display,
{
    let depth = match strategy {
        MatchStrategy::Strict => 1,
        MatchStrategy::Loose => criteria.len(),
    };

    for criterion in criteria.iter().take(depth) {
        let mut found = find(criterion)?;
        match found.len() {
            0 => debug!(%criterion, "no {label} matched"),
            1 => {
                debug!(%criterion, "matched existing {label}");
                return Ok(found.pop());
            }
            _ => {
                return Err(OnboardError::general(format!(
                    "multiple {label} found searching on {criterion}"
                )));
            }
        }
    }
    Ok(None)
}

/// Resolve a status by name for one record kind.
///
/// `label` names the kind in error messages ("device", "IP address").
pub(crate) fn resolve_status<S: InventoryStore + ?Sized>(
    store: &S,
    kind: RecordKind,
    label: &str,
    name: &str,
) -> Result<Status, OnboardError> {
    let mut statuses = store.find_statuses(kind, name)?;
    match statuses.len() {
        0 => Err(OnboardError::general(format!(
            "could not find existing {label} status: {name}"
        ))),
        1 => statuses
            .pop()
            .ok_or_else(|| OnboardError::general(format!("{label} status vanished: {name}"))),
        _ => Err(OnboardError::general(format!(
            "multiple {label} status using same name: {name}"
        ))),
    }
}

/// Slugify a display name, refusing names with no sluggable characters.
pub(crate) fn slug_for(label: &str, name: &str) -> Result<Slug, OnboardError> {
    let slug = Slug::from_name(name);
    if slug.is_empty() {
        Err(OnboardError::general(format!(
            "cannot derive a slug from {label} '{name}'"
        )))
    } else {
        Ok(slug)
    }
}

/// Create a record, adopting the winner when a concurrent attempt took the
/// unique key first.
///
/// `relookup` runs at most once, and only after a conflict.
pub(crate) fn create_or_adopt<T>(
    create: impl FnOnce() -> Result<T, StoreError>,
    relookup: impl FnOnce() -> Result<Option<T>, OnboardError>,
) -> Result<T, OnboardError> {
    match create() {
        Ok(record) => Ok(record),
        Err(StoreError::Conflict { kind, key }) => {
            debug!(%kind, %key, "create lost the race, adopting existing record");
            relookup()?.ok_or_else(|| StoreError::Conflict { kind, key }.into())
        }
        Err(e) => Err(e.into()),
    }
}
