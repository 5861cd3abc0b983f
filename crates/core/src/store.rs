//! In-memory code entry cache
//!
//! Readers load an immutable snapshot and get shared `Arc<CodeEntry>`
//! handles. Writers never touch a published entry: they clone it, mutate
//! the clone and publish a new snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::debug;

use crate::code::{CodeEntry, CodeId, IdPolicy};
use crate::error::FhirError;

#[derive(Debug, Clone, Default)]
struct CodeIndex {
    by_id: HashMap<CodeId, Arc<CodeEntry>>,
    by_key: HashMap<(String, String), CodeId>,
}

impl CodeIndex {
    fn key_of(entry: &CodeEntry) -> Option<(String, String)> {
        entry
            .key()
            .map(|(name, value)| (name.to_string(), value.to_string()))
    }

    fn put(&mut self, id: CodeId, entry: Arc<CodeEntry>) {
        if let Some(key) = Self::key_of(&entry) {
            self.by_key.insert(key, id);
        }
        self.by_id.insert(id, entry);
    }

    fn remove(&mut self, id: CodeId) -> Option<Arc<CodeEntry>> {
        let entry = self.by_id.remove(&id)?;
        if let Some(key) = Self::key_of(&entry) {
            if self.by_key.get(&key) == Some(&id) {
                self.by_key.remove(&key);
            }
        }
        Some(entry)
    }

    /// Id already holding `entry`'s key, other than `entry` itself
    fn key_holder(&self, entry: &CodeEntry) -> Option<CodeId> {
        let (name, value) = entry.key()?;
        self.by_key
            .get(&(name.to_string(), value.to_string()))
            .copied()
            .filter(|holder| Some(*holder) != entry.id())
    }
}

/// Copy-on-write cache of code entries keyed by id and (codeName, value)
#[derive(Debug)]
pub struct CodeStore {
    snapshot: ArcSwap<CodeIndex>,
    next_id: AtomicI64,
    writer: Mutex<()>,
}

impl Default for CodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeStore {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(CodeIndex::default()),
            next_id: AtomicI64::new(1),
            writer: Mutex::new(()),
        }
    }

    /// Exact match on (codeName, value). No case folding or trimming.
    pub fn lookup(&self, code_name: &str, value: &str) -> Option<Arc<CodeEntry>> {
        let index = self.snapshot.load();
        let id = index
            .by_key
            .get(&(code_name.to_string(), value.to_string()))?;
        index.by_id.get(id).cloned()
    }

    pub fn get(&self, id: CodeId) -> Option<Arc<CodeEntry>> {
        self.snapshot.load().by_id.get(&id).cloned()
    }

    /// All entries of a code system, ordered by `intValue` (absent last)
    /// and then by `value`
    pub fn by_code_name(&self, code_name: &str) -> Vec<Arc<CodeEntry>> {
        let index = self.snapshot.load();
        let mut entries: Vec<_> = index
            .by_id
            .values()
            .filter(|e| e.code_name.as_deref() == Some(code_name))
            .cloned()
            .collect();

        entries.sort_by(|a, b| {
            let int_order = match (a.int_value, b.int_value) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            int_order
                .then_with(|| a.value.cmp(&b.value))
                .then_with(|| a.id().cmp(&b.id()))
        });
        entries
    }

    /// Every entry, in id order
    pub fn all(&self) -> Vec<Arc<CodeEntry>> {
        let mut entries: Vec<_> = self.snapshot.load().by_id.values().cloned().collect();
        entries.sort_by_key(|e| e.id());
        entries
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole cache with entries loaded from persistence.
    ///
    /// Entries without an id are given one. Two entries sharing an id or a
    /// (codeName, value) key are rejected and the cache is left unchanged.
    pub fn load(&self, entries: impl IntoIterator<Item = CodeEntry>) -> Result<usize, FhirError> {
        let _guard = self.lock();
        let entries: Vec<CodeEntry> = entries.into_iter().collect();

        let max_id = entries
            .iter()
            .filter_map(|e| e.id())
            .map(|id| id.get())
            .max()
            .unwrap_or(0);
        self.next_id.fetch_max(successor(max_id)?, Ordering::SeqCst);

        let mut index = CodeIndex::default();
        for entry in entries {
            let entry = match entry.id() {
                Some(_) => entry,
                None => entry.assign_id(self.allocate_id()?)?,
            };
            let id = entry.id().ok_or_else(|| {
                FhirError::Internal("loaded code entry has no id".to_string())
            })?;

            if index.by_id.contains_key(&id) {
                return Err(FhirError::Conflict(format!("code entry {} loaded twice", id)));
            }
            if let Some(holder) = index.key_holder(&entry) {
                return Err(FhirError::Conflict(format!(
                    "code {} is stored as both entry {} and entry {}",
                    entry, holder, id
                )));
            }
            index.put(id, Arc::new(entry));
        }

        let count = index.by_id.len();
        self.snapshot.store(Arc::new(index));

        debug!(count, "Code store loaded");
        Ok(count)
    }

    /// Publish a new entry, allocating an id if it has none.
    pub fn insert(&self, entry: CodeEntry) -> Result<Arc<CodeEntry>, FhirError> {
        let _guard = self.lock();
        let current = self.snapshot.load_full();

        if let Some(id) = entry.id() {
            if current.by_id.contains_key(&id) {
                return Err(FhirError::Conflict(format!("code entry {} already exists", id)));
            }
        }
        if let Some(holder) = current.key_holder(&entry) {
            return Err(FhirError::Conflict(format!(
                "code {} already exists as entry {}",
                entry, holder
            )));
        }

        let entry = match entry.id() {
            Some(id) => {
                self.next_id.fetch_max(successor(id.get())?, Ordering::SeqCst);
                entry
            }
            None => entry.assign_id(self.allocate_id()?)?,
        };
        let id = entry
            .id()
            .ok_or_else(|| FhirError::Internal("inserted code entry has no id".to_string()))?;

        let entry = Arc::new(entry);
        let mut next = CodeIndex::clone(&current);
        next.put(id, entry.clone());
        self.snapshot.store(Arc::new(next));

        debug!(code_id = %id, code = %entry, "Code entry inserted");
        Ok(entry)
    }

    /// Swap a prepared copy in for the published entry with the same id.
    pub fn replace(&self, entry: CodeEntry) -> Result<Arc<CodeEntry>, FhirError> {
        let _guard = self.lock();
        self.publish(entry)
    }

    /// Clone the entry, apply `f` to the clone, and publish it.
    pub fn update<F>(&self, id: CodeId, f: F) -> Result<Arc<CodeEntry>, FhirError>
    where
        F: FnOnce(&mut CodeEntry),
    {
        let _guard = self.lock();
        let current = self
            .snapshot
            .load()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| FhirError::NotFound(format!("code entry {}", id)))?;

        let mut draft = current.duplicate(IdPolicy::Preserve);
        f(&mut draft);
        self.publish(draft)
    }

    /// Swap `entry` in only if `base` is still the published entry for its
    /// id. A copy prepared from a handle that another writer has since
    /// replaced is rejected with `Conflict`.
    pub fn replace_if_current(
        &self,
        base: &Arc<CodeEntry>,
        entry: CodeEntry,
    ) -> Result<Arc<CodeEntry>, FhirError> {
        let _guard = self.lock();
        let id = base
            .id()
            .ok_or_else(|| FhirError::Invalid("cannot replace an unsaved code entry".to_string()))?;

        match self.snapshot.load().by_id.get(&id) {
            Some(published) if Arc::ptr_eq(published, base) => {}
            Some(_) => {
                return Err(FhirError::Conflict(format!(
                    "code entry {} was modified concurrently",
                    id
                )));
            }
            None => return Err(FhirError::NotFound(format!("code entry {}", id))),
        }
        if entry.id() != Some(id) {
            return Err(FhirError::Invalid(format!(
                "replacement for code entry {} carries a different id",
                id
            )));
        }

        self.publish(entry)
    }

    pub fn remove(&self, id: CodeId) -> Option<Arc<CodeEntry>> {
        let _guard = self.lock();
        let mut next = CodeIndex::clone(&self.snapshot.load_full());
        let removed = next.remove(id)?;
        self.snapshot.store(Arc::new(next));

        debug!(code_id = %id, "Code entry removed");
        Some(removed)
    }

    // Caller holds the writer lock.
    fn publish(&self, entry: CodeEntry) -> Result<Arc<CodeEntry>, FhirError> {
        let id = entry
            .id()
            .ok_or_else(|| FhirError::Invalid("cannot replace an unsaved code entry".to_string()))?;

        let current = self.snapshot.load_full();
        if !current.by_id.contains_key(&id) {
            return Err(FhirError::NotFound(format!("code entry {}", id)));
        }
        if let Some(holder) = current.key_holder(&entry) {
            return Err(FhirError::Conflict(format!(
                "code {} already exists as entry {}",
                entry, holder
            )));
        }

        let entry = Arc::new(entry);
        let mut next = CodeIndex::clone(&current);
        next.remove(id);
        next.put(id, entry.clone());
        self.snapshot.store(Arc::new(next));

        debug!(code_id = %id, code = %entry, "Code entry replaced");
        Ok(entry)
    }

    fn allocate_id(&self) -> Result<CodeId, FhirError> {
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map(CodeId::new)
            .map_err(|_| FhirError::Internal("code id space exhausted".to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn successor(id: i64) -> Result<i64, FhirError> {
    id.checked_add(1)
        .ok_or_else(|| FhirError::Internal(format!("code id {} leaves no room for new ids", id)))
}
