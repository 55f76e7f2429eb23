use crate::{Partition, Store, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process store. Used when no persistent storage is configured and in tests.
///
/// Availability can be switched off to simulate a storage engine that is
/// full or not initialised.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(Partition, String), Vec<u8>>>,
    writes: Mutex<HashMap<Partition, usize>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`] (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful writes to `partition` so far.
    pub fn write_count(&self, partition: Partition) -> usize {
        self.writes.lock().get(&partition).copied().unwrap_or(0)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store switched off"))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn write(
        &self,
        partition: Partition,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock();
        if partition == Partition::Autosave {
            records.retain(|(p, _), _| *p != Partition::Autosave);
        }
        records.insert((partition, key.to_string()), bytes);
        *self.writes.lock().entry(partition).or_insert(0) += 1;
        Ok(())
    }

    async fn read(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .get(&(partition, key.to_string()))
            .cloned())
    }

    async fn list(&self, partition: Partition) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .keys()
            .filter(|(p, _)| *p == partition)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.records.lock().remove(&(partition, key.to_string()));
        Ok(())
    }
}
