// ── Generic record collection ──
//
// Concurrent storage for one record kind with a unique natural-key
// index. The index's entry API is what makes creates atomic.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::RecordId;

/// A concurrent collection for a single record kind.
///
/// Records live in `by_id`; `unique` maps the kind's natural key (slug,
/// `site/name`, `device/name`, address) to the owning id. Lock order is
/// always `unique` before `by_id`.
pub(crate) struct RecordCollection<T: Clone + Send + Sync + 'static> {
    by_id: DashMap<RecordId, T>,
    unique: DashMap<String, RecordId>,
}

impl<T: Clone + Send + Sync + 'static> RecordCollection<T> {
    pub(crate) fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            unique: DashMap::new(),
        }
    }

    /// Insert a record under `key` unless the key is already taken.
    ///
    /// `build` receives the freshly allocated id and runs while the key's
    /// shard is locked, so two racing inserts cannot both succeed. On
    /// conflict the taken key is returned.
    pub(crate) fn insert_unique(
        &self,
        key: String,
        build: impl FnOnce(RecordId) -> T,
    ) -> Result<T, String> {
        match self.unique.entry(key) {
            Entry::Occupied(e) => Err(e.key().clone()),
            Entry::Vacant(v) => {
                let id = RecordId::new();
                let record = build(id.clone());
                self.by_id.insert(id.clone(), record.clone());
                v.insert(id);
                Ok(record)
            }
        }
    }

    pub(crate) fn get(&self, id: &RecordId) -> Option<T> {
        self.by_id.get(id).map(|r| r.value().clone())
    }

    pub(crate) fn get_by_key(&self, key: &str) -> Option<T> {
        let id = self.unique.get(key).map(|r| r.value().clone())?;
        self.get(&id)
    }

    /// Mutate a record in place. Returns the updated record.
    pub(crate) fn update(&self, id: &RecordId, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut entry = self.by_id.get_mut(id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    /// Move a record's unique key from `old_key` to `new_key`.
    ///
    /// Fails with the taken key when `new_key` belongs to another record.
    pub(crate) fn rekey(
        &self,
        old_key: &str,
        new_key: String,
        id: &RecordId,
    ) -> Result<(), String> {
        if old_key == new_key {
            return Ok(());
        }
        match self.unique.entry(new_key) {
            Entry::Occupied(e) if e.get() != id => return Err(e.key().clone()),
            Entry::Occupied(_) => {}
            Entry::Vacant(v) => {
                v.insert(id.clone());
            }
        }
        self.unique.remove_if(old_key, |_, owner| owner == id);
        Ok(())
    }

    /// All records matching `pred`, in no particular order.
    pub(crate) fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.by_id
            .iter()
            .filter(|r| pred(r.value()))
            .map(|r| r.value().clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}
