//! In-memory object store.

use crate::object::{ObjectClient, ObjectInfo, ObjectResult};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    modified: SystemTime,
}

/// An in-memory object store.
///
/// This store keeps every object in a `HashMap` and is suitable for:
/// - Unit tests
/// - Pools of the in-process [`crate::MemoryCluster`]
/// - Ephemeral backends that don't need persistence
///
/// Writes can be made to fail on demand to exercise commit failure paths.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use blockstore_backend::{InMemoryObjectStore, ObjectClient};
/// use bytes::Bytes;
///
/// let store = InMemoryObjectStore::new();
/// store.put("greeting", Bytes::from_static(b"hello")).unwrap();
/// assert_eq!(store.get("greeting").unwrap().unwrap(), "hello");
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_writes: AtomicBool,
}

impl InMemoryObjectStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Returns a sorted list of all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Removes all objects.
    pub fn clear(&self) {
        self.objects.write().clear();
    }

    /// Makes every subsequent `put` and `delete` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> ObjectResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure").into());
        }
        Ok(())
    }
}

impl ObjectClient for InMemoryObjectStore {
    fn get(&self, key: &str) -> ObjectResult<Option<Bytes>> {
        Ok(self.objects.read().get(key).map(|obj| obj.data.clone()))
    }

    fn head(&self, key: &str) -> ObjectResult<Option<ObjectInfo>> {
        Ok(self.objects.read().get(key).map(|obj| ObjectInfo {
            size: obj.data.len() as u64,
            modified: Some(obj.modified),
        }))
    }

    fn put(&self, key: &str, data: Bytes) -> ObjectResult<()> {
        self.check_writable()?;
        let object = StoredObject {
            data,
            modified: SystemTime::now(),
        };
        self.objects.write().insert(key.to_string(), object);
        Ok(())
    }

    fn delete(&self, key: &str) -> ObjectResult<()> {
        self.check_writable()?;
        self.objects.write().remove(key);
        Ok(())
    }

    fn list(&self, visit: &mut dyn FnMut(&str) -> bool) -> ObjectResult<()> {
        // Snapshot the keys so visitors may call back into the store.
        let keys: Vec<String> = self.objects.read().keys().cloned().collect();
        for key in &keys {
            if !visit(key) {
                break;
            }
        }
        Ok(())
    }
}
