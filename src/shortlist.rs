//! Locally persisted "saved" lists.
//!
//! Each list is stored as one JSON blob `{ "ids": [...], "records": [...] }`,
//! kept sorted by id and rewritten in full on every change, so the stored
//! bytes depend only on which ids are saved. Other views learn about changes
//! through [`ShortlistStore::subscribe`] instead of re-reading storage.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::FinderResult;
use crate::models::{AdmitRecord, CourseRecord};
use crate::storage::Storage;

pub const COLLEGES_KEY: &str = "shortlisted-colleges";
pub const COURSES_KEY: &str = "shortlisted-courses";

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub trait Shortlistable: Clone + Serialize + DeserializeOwned {
    fn shortlist_id(&self) -> i64;
}

impl Shortlistable for AdmitRecord {
    fn shortlist_id(&self) -> i64 {
        self.id
    }
}

impl Shortlistable for CourseRecord {
    fn shortlist_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortlistEvent {
    pub key: String,
    pub id: i64,
    pub saved: bool,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Blob<T> {
    #[serde(default)]
    ids: Vec<i64>,
    #[serde(default)]
    records: Vec<T>,
}

/// Receives change events until dropped.
pub struct ShortlistSubscription {
    receiver: broadcast::Receiver<ShortlistEvent>,
}

impl ShortlistSubscription {
    /// Waits for the next change. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<ShortlistEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "shortlist subscriber fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<ShortlistEvent> {
        self.receiver.try_recv().ok()
    }
}

pub struct ShortlistStore<T: Shortlistable> {
    key: String,
    storage: Arc<dyn Storage>,
    ids: Vec<i64>,
    records: Vec<T>,
    events: broadcast::Sender<ShortlistEvent>,
}

impl<T: Shortlistable> ShortlistStore<T> {
    /// Loads the list stored under `key`. Missing or unreadable blobs start an
    /// empty list.
    pub fn load(storage: Arc<dyn Storage>, key: &str) -> Self {
        let blob = match storage.read(key) {
            Ok(Some(raw)) => serde_json::from_str::<Blob<T>>(&raw).unwrap_or_else(|err| {
                warn!(key, error = %err, "discarding malformed shortlist");
                Blob::empty()
            }),
            Ok(None) => Blob::empty(),
            Err(err) => {
                warn!(key, error = %err, "failed to read shortlist");
                Blob::empty()
            }
        };

        let (ids, records) = blob.into_synced();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        debug!(key, count = ids.len(), "loaded shortlist");

        Self {
            key: key.to_string(),
            storage,
            ids,
            records,
            events,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn subscribe(&self) -> ShortlistSubscription {
        ShortlistSubscription {
            receiver: self.events.subscribe(),
        }
    }

    /// Adds `item` if absent, removes it otherwise, and returns whether it is
    /// now saved. The in-memory list changes even if persisting fails.
    pub fn toggle(&mut self, item: &T) -> bool {
        let id = item.shortlist_id();
        let saved = match self.ids.binary_search(&id) {
            Ok(index) => {
                self.ids.remove(index);
                self.records.remove(index);
                false
            }
            Err(index) => {
                self.ids.insert(index, id);
                self.records.insert(index, item.clone());
                true
            }
        };

        if let Err(err) = self.persist() {
            warn!(key = %self.key, id, error = %err, "failed to persist shortlist");
        }

        let _ = self.events.send(ShortlistEvent {
            key: self.key.clone(),
            id,
            saved,
        });
        saved
    }

    fn persist(&self) -> FinderResult<()> {
        let blob = BlobRef {
            ids: &self.ids,
            records: &self.records,
        };
        let raw = serde_json::to_string(&blob)?;
        self.storage.write(&self.key, &raw)
    }
}

#[derive(Serialize)]
struct BlobRef<'a, T: Serialize> {
    ids: &'a [i64],
    records: &'a [T],
}

impl<T: Shortlistable> Blob<T> {
    fn empty() -> Self {
        Self {
            ids: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Deduplicates, keeps only ids that have a stored record, and orders both
    /// lists by id so `records[i]` belongs to `ids[i]`.
    fn into_synced(self) -> (Vec<i64>, Vec<T>) {
        let mut ids = self.ids;
        ids.sort_unstable();
        ids.dedup();

        let mut records: Vec<T> = Vec::with_capacity(ids.len());
        for record in self.records {
            let id = record.shortlist_id();
            if ids.binary_search(&id).is_ok()
                && !records.iter().any(|kept| kept.shortlist_id() == id)
            {
                records.push(record);
            }
        }
        records.sort_by_key(|record| record.shortlist_id());

        ids.retain(|id| {
            records
                .binary_search_by_key(id, |record| record.shortlist_id())
                .is_ok()
        });
        (ids, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinderError;
    use crate::storage::MemoryStorage;

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn read(&self, _key: &str) -> FinderResult<Option<String>> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> FinderResult<()> {
            Err(FinderError::Storage("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> FinderResult<()> {
            Ok(())
        }
    }

    fn course(id: i64, program: &str) -> CourseRecord {
        CourseRecord {
            id,
            university: Some("University of Edinburgh".to_string()),
            program: Some(program.to_string()),
            concentration: None,
            country: Some("United Kingdom".to_string()),
            study_level: Some("Masters".to_string()),
            duration: Some("1 year".to_string()),
            intakes: Some("September".to_string()),
            deadline: None,
            tuition: None,
            english_requirement: Some("IELTS 6.5".to_string()),
        }
    }

    #[test]
    fn toggle_twice_restores_stored_blob() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = ShortlistStore::load(storage.clone(), COURSES_KEY);
        store.toggle(&course(1, "MSc Artificial Intelligence"));
        let before = storage.read(COURSES_KEY).unwrap();

        let other = course(2, "MSc Data Science");
        assert!(store.toggle(&other));
        assert!(store.contains(2));
        assert!(!store.toggle(&other));

        assert_eq!(storage.read(COURSES_KEY).unwrap(), before);
        assert_eq!(store.ids(), &[1]);
    }

    #[test]
    fn toggling_a_saved_item_twice_keeps_the_stored_order() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = ShortlistStore::load(storage.clone(), COURSES_KEY);
        let first = course(1, "MSc Artificial Intelligence");
        store.toggle(&first);
        store.toggle(&course(2, "MSc Data Science"));
        let before = storage.read(COURSES_KEY).unwrap();

        assert!(!store.toggle(&first));
        assert!(store.toggle(&first));

        assert_eq!(storage.read(COURSES_KEY).unwrap(), before);
        assert_eq!(store.ids(), &[1, 2]);
        assert_eq!(store.records()[0].shortlist_id(), 1);
    }

    #[test]
    fn saved_order_does_not_depend_on_toggle_order() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = ShortlistStore::load(storage, COURSES_KEY);
        store.toggle(&course(9, "MSc Finance"));
        store.toggle(&course(3, "MSc Economics"));
        store.toggle(&course(5, "MSc Statistics"));

        assert_eq!(store.ids(), &[3, 5, 9]);
        let record_ids: Vec<i64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(record_ids, vec![3, 5, 9]);
    }

    #[test]
    fn reload_sees_persisted_records() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = ShortlistStore::load(storage.clone(), COURSES_KEY);
        store.toggle(&course(7, "MSc Robotics"));

        let reloaded: ShortlistStore<CourseRecord> = ShortlistStore::load(storage, COURSES_KEY);
        assert_eq!(reloaded.ids(), &[7]);
        assert_eq!(reloaded.records()[0].program.as_deref(), Some("MSc Robotics"));
    }

    #[test]
    fn malformed_blob_loads_empty() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.write(COURSES_KEY, "{not json").unwrap();
        let store: ShortlistStore<CourseRecord> = ShortlistStore::load(storage, COURSES_KEY);
        assert!(store.ids().is_empty());
        assert!(store.records().is_empty());
    }

    #[test]
    fn loaded_ids_and_records_are_synced() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let records = vec![course(4, "D"), course(1, "A"), course(1, "A"), course(3, "C")];
        let raw = serde_json::json!({ "ids": [4, 1, 1, 2], "records": records }).to_string();
        storage.write(COURSES_KEY, &raw).unwrap();

        let store: ShortlistStore<CourseRecord> = ShortlistStore::load(storage, COURSES_KEY);
        assert_eq!(store.ids(), &[1, 4]);
        let record_ids: Vec<i64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(record_ids, vec![1, 4]);
    }

    #[test]
    fn persistence_failure_still_updates_memory() {
        let storage: Arc<dyn Storage> = Arc::new(BrokenStorage);
        let mut store = ShortlistStore::load(storage, COURSES_KEY);
        assert!(store.toggle(&course(4, "MSc Physics")));
        assert!(store.contains(4));
    }

    #[tokio::test]
    async fn subscribers_are_notified_of_toggles() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = ShortlistStore::load(storage, COURSES_KEY);
        let mut first = store.subscribe();
        let mut second = store.subscribe();

        store.toggle(&course(5, "MSc Statistics"));

        let expected = ShortlistEvent {
            key: COURSES_KEY.to_string(),
            id: 5,
            saved: true,
        };
        assert_eq!(first.recv().await, Some(expected.clone()));
        assert_eq!(second.try_recv(), Some(expected));
    }

    #[test]
    fn dropped_subscription_unsubscribes() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store: ShortlistStore<CourseRecord> = ShortlistStore::load(storage, COURSES_KEY);
        let subscription = store.subscribe();
        assert_eq!(store.events.receiver_count(), 1);
        drop(subscription);
        assert_eq!(store.events.receiver_count(), 0);
    }
}
