//! Process-wide store of cached objects.
//!
//! Objects are looked up by type and name. Creation happens under the
//! registry lock, so concurrent callers asking for the same key build it once.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Entry = Arc<dyn Any + Send + Sync>;

/// Keyed store of shared objects, the registry every persistent handle
/// lives in.
///
/// Entries are scoped by type, so an executor and a communicator may share a
/// name without colliding. The registry is the owning side of every entry;
/// callers receive `Arc` clones. Entries are never removed while the
/// registry lives.
#[derive(Default)]
pub struct ObjectRegistry {
    entries: Mutex<BTreeMap<(TypeId, String), Entry>>,
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("ObjectRegistry")
            .field("entries", &entries.len())
            .finish()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an object of type `T` is stored under `key`.
    pub fn contains<T: Any + Send + Sync>(&self, key: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&(TypeId::of::<T>(), key.to_string()))
    }

    /// Object of type `T` stored under `key`, if any.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.lock();
        let entry = entries.get(&(TypeId::of::<T>(), key.to_string()))?;
        Arc::clone(entry).downcast::<T>().ok()
    }

    /// Object stored under `key`, building it with `factory` on first use.
    ///
    /// The lock is held while `factory` runs, so concurrent callers for the
    /// same key never build twice. A failing factory leaves no entry behind
    /// and the next caller tries again.
    pub fn get_or_create<T, E, F>(&self, key: &str, factory: F) -> Result<(Arc<T>, bool), E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        let mut entries = self.entries.lock();
        let id = (TypeId::of::<T>(), key.to_string());
        if let Some(entry) = entries.get(&id) {
            if let Ok(object) = Arc::clone(entry).downcast::<T>() {
                return Ok((object, false));
            }
        }
        let object = factory()?;
        let entry: Entry = object.clone();
        entries.insert(id, entry);
        Ok((object, true))
    }

    /// Number of stored objects of all types.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Names of the objects of type `T`, sorted.
    pub fn keys<T: Any + Send + Sync>(&self) -> Vec<String> {
        let wanted = TypeId::of::<T>();
        self.entries
            .lock()
            .keys()
            .filter(|(type_id, _)| *type_id == wanted)
            .map(|(_, name)| name.clone())
            .collect()
    }
}
