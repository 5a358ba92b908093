//! Entity stores
//!
//! One [`EntityStore`] per record type owns a persisted collection inside a
//! [`DatabaseBackend`]. Every mutation rewrites the whole snapshot under the
//! type's storage key.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::DatabaseBackend;
use crate::models::{
    Contact, ContactPatch, Deal, DealPatch, EntityId, NewContact, NewDeal, NewTask, Task,
    TaskPatch, Validate,
};
use crate::seed;

/// A record type that can live in an [`EntityStore`]
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Fields required to create a record
    type Draft: Validate;
    /// Field-level update
    type Patch: Validate;

    /// Backend key holding the full collection
    const STORAGE_KEY: &'static str;
    /// JSON array written when the key is absent
    const SEED: &'static str;
    /// Singular name used in logs and messages
    const KIND: &'static str;

    fn id(&self) -> EntityId;
    fn build(id: EntityId, draft: Self::Draft, now: DateTime<Utc>) -> Self;
    fn merge(&mut self, patch: Self::Patch, now: DateTime<Utc>);
}

impl Entity for Contact {
    type Draft = NewContact;
    type Patch = ContactPatch;

    const STORAGE_KEY: &'static str = "autocrm_contacts";
    const SEED: &'static str = seed::CONTACTS;
    const KIND: &'static str = "contact";

    fn id(&self) -> EntityId {
        self.id
    }

    fn build(id: EntityId, draft: NewContact, now: DateTime<Utc>) -> Self {
        Contact::from_draft(id, draft, now)
    }

    fn merge(&mut self, patch: ContactPatch, _now: DateTime<Utc>) {
        self.apply(patch);
    }
}

impl Entity for Deal {
    type Draft = NewDeal;
    type Patch = DealPatch;

    const STORAGE_KEY: &'static str = "autocrm_deals";
    const SEED: &'static str = seed::DEALS;
    const KIND: &'static str = "deal";

    fn id(&self) -> EntityId {
        self.id
    }

    fn build(id: EntityId, draft: NewDeal, now: DateTime<Utc>) -> Self {
        Deal::from_draft(id, draft, now)
    }

    fn merge(&mut self, patch: DealPatch, now: DateTime<Utc>) {
        self.apply(patch, now);
    }
}

impl Entity for Task {
    type Draft = NewTask;
    type Patch = TaskPatch;

    const STORAGE_KEY: &'static str = "autocrm_tasks";
    const SEED: &'static str = seed::TASKS;
    const KIND: &'static str = "task";

    fn id(&self) -> EntityId {
        self.id
    }

    fn build(id: EntityId, draft: NewTask, now: DateTime<Utc>) -> Self {
        Task::from_draft(id, draft, now)
    }

    fn merge(&mut self, patch: TaskPatch, _now: DateTime<Utc>) {
        self.apply(patch);
    }
}

/// Artificial per-operation delay, applied before storage is touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency {
    pub list: Duration,
    pub get: Duration,
    pub write: Duration,
    pub delete: Duration,
}

impl Latency {
    pub const NONE: Latency = Latency {
        list: Duration::ZERO,
        get: Duration::ZERO,
        write: Duration::ZERO,
        delete: Duration::ZERO,
    };

    /// Delays that make a local store feel like a remote one
    pub fn demo() -> Self {
        Self {
            list: Duration::from_millis(250),
            get: Duration::from_millis(200),
            write: Duration::from_millis(300),
            delete: Duration::from_millis(250),
        }
    }

    fn pause(delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Persisted collection of one entity type
pub struct EntityStore<T: Entity> {
    backend: Arc<dyn DatabaseBackend>,
    latency: Latency,
    write_guard: Mutex<()>,
    _entity: PhantomData<fn() -> T>,
}

pub type ContactStore = EntityStore<Contact>;
pub type DealStore = EntityStore<Deal>;
pub type TaskStore = EntityStore<Task>;

impl<T: Entity> EntityStore<T> {
    pub fn new(backend: Arc<dyn DatabaseBackend>) -> Self {
        Self {
            backend,
            latency: Latency::NONE,
            write_guard: Mutex::new(()),
            _entity: PhantomData,
        }
    }

    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    pub fn backend(&self) -> &Arc<dyn DatabaseBackend> {
        &self.backend
    }

    /// Writes the bundled seed when the collection has never been stored.
    /// Returns true when the seed was written
    pub fn init(&self) -> Result<bool> {
        let seeded = self.backend.seed_if_absent(T::STORAGE_KEY, T::SEED)?;
        if seeded {
            tracing::info!(key = T::STORAGE_KEY, "seeded {} collection", T::KIND);
        }
        Ok(seeded)
    }

    /// Full collection in stored order
    pub fn get_all(&self) -> Result<Vec<T>> {
        Latency::pause(self.latency.list);
        self.load()
    }

    pub fn get_by_id(&self, id: EntityId) -> Result<Option<T>> {
        Latency::pause(self.latency.get);
        Ok(self.load()?.into_iter().find(|r| r.id() == id))
    }

    /// Validates the draft, assigns the next identifier and appends the record
    pub fn create(&self, draft: T::Draft) -> Result<T> {
        draft.validate()?;
        Latency::pause(self.latency.write);

        let created = self.modify(|records| {
            let id = next_id(records);
            let record = T::build(id, draft, Utc::now());
            records.push(record.clone());
            Some(record)
        })?;

        let record = created.ok_or_else(|| anyhow!("Failed to create {}", T::KIND))?;
        tracing::debug!(id = record.id(), "created {}", T::KIND);
        Ok(record)
    }

    /// Merges `patch` into the record. Returns `None` without writing when
    /// the identifier is unknown
    pub fn update(&self, id: EntityId, patch: T::Patch) -> Result<Option<T>> {
        patch.validate()?;
        Latency::pause(self.latency.write);

        let updated = self.modify(|records| {
            let record = records.iter_mut().find(|r| r.id() == id)?;
            record.merge(patch, Utc::now());
            Some(record.clone())
        })?;

        match &updated {
            Some(_) => tracing::debug!(id, "updated {}", T::KIND),
            None => tracing::debug!(id, "{} not found for update", T::KIND),
        }
        Ok(updated)
    }

    /// Stores `record` in place of the one with the same identifier.
    /// Returns `None` when no such record exists any more
    pub fn replace(&self, record: T) -> Result<Option<T>> {
        Latency::pause(self.latency.write);
        self.modify(|records| {
            let slot = records.iter_mut().find(|r| r.id() == record.id())?;
            *slot = record.clone();
            Some(record)
        })
    }

    /// Removes the record if present. Always returns true
    pub fn delete(&self, id: EntityId) -> Result<bool> {
        Latency::pause(self.latency.delete);
        self.modify(|records| {
            records.retain(|r| r.id() != id);
            Some(())
        })?;
        tracing::debug!(id, "deleted {}", T::KIND);
        Ok(true)
    }

    fn load(&self) -> Result<Vec<T>> {
        let json = self.backend.load_collection(T::STORAGE_KEY)?;
        parse_collection(T::STORAGE_KEY, json.as_deref())
    }

    /// Read-modify-write of the whole collection. `change` returns `None` to
    /// leave storage untouched
    fn modify<R>(&self, change: impl FnOnce(&mut Vec<T>) -> Option<R>) -> Result<Option<R>> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| anyhow!("{} store lock poisoned", T::KIND))?;

        let mut change = Some(change);
        let mut outcome = None;
        self.backend.update_collection(T::STORAGE_KEY, &mut |current| {
            let mut records: Vec<T> = parse_collection(T::STORAGE_KEY, current)?;
            let Some(change) = change.take() else {
                return Ok(None);
            };
            match change(&mut records) {
                Some(result) => {
                    outcome = Some(result);
                    let json = serde_json::to_string_pretty(&records)
                        .with_context(|| format!("Failed to serialize {}", T::STORAGE_KEY))?;
                    Ok(Some(json))
                }
                None => Ok(None),
            }
        })?;
        Ok(outcome)
    }
}

fn next_id<T: Entity>(records: &[T]) -> EntityId {
    records.iter().map(|r| r.id()).max().map_or(1, |max| max + 1)
}

fn parse_collection<T: DeserializeOwned>(key: &str, json: Option<&str>) -> Result<Vec<T>> {
    match json {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(json)
            .with_context(|| format!("Failed to parse collection '{}'", key)),
        _ => Ok(Vec::new()),
    }
}

/// The three stores sharing one backend
pub struct Stores {
    pub contacts: ContactStore,
    pub deals: Arc<DealStore>,
    pub tasks: TaskStore,
}

impl Stores {
    pub fn new(backend: Arc<dyn DatabaseBackend>, latency: Latency) -> Self {
        Self {
            contacts: ContactStore::new(backend.clone()).with_latency(latency),
            deals: Arc::new(DealStore::new(backend.clone()).with_latency(latency)),
            tasks: TaskStore::new(backend).with_latency(latency),
        }
    }

    /// Seeds every collection that has never been stored
    pub fn init(&self) -> Result<()> {
        self.contacts.init()?;
        self.deals.init()?;
        self.tasks.init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatencyProfile;
    use crate::db::{JsonBackend, MemoryBackend};
    use crate::models::{DealStatus, ValidationErrors};
    use tempfile::TempDir;

    fn memory() -> Arc<dyn DatabaseBackend> {
        Arc::new(MemoryBackend::new())
    }

    fn new_deal(name: &str) -> NewDeal {
        NewDeal {
            name: name.into(),
            contact_id: Some(1),
            value: 1000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_assigns_one_on_empty_collection() {
        let store = DealStore::new(memory());
        let deal = store.create(new_deal("First")).unwrap();
        assert_eq!(deal.id, 1);
        assert_eq!(deal.notes, "");
        assert_eq!(deal.created_at, deal.updated_at);
    }

    #[test]
    fn test_create_assigns_max_plus_one_and_persists() {
        let store = DealStore::new(memory());
        store.init().unwrap();
        let before = store.get_all().unwrap();
        let max = before.iter().map(|d| d.id).max().unwrap();

        let deal = store.create(new_deal("Next")).unwrap();
        assert_eq!(deal.id, max + 1);

        let after = store.get_all().unwrap();
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after.last(), Some(&deal));
    }

    #[test]
    fn test_next_id_uses_max_not_length() {
        let store = ContactStore::new(memory());
        for name in ["a", "b", "c"] {
            store
                .create(NewContact {
                    name: name.into(),
                    ..Default::default()
                })
                .unwrap();
        }
        store.delete(1).unwrap();
        let contact = store
            .create(NewContact {
                name: "d".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(contact.id, 4);
    }

    #[test]
    fn test_create_then_get_by_id_round_trip() {
        let store = TaskStore::new(memory());
        let due = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let task = store
            .create(NewTask {
                description: "Call back".into(),
                due_date: Some(due),
                ..Default::default()
            })
            .unwrap();

        let loaded = store.get_by_id(task.id).unwrap().unwrap();
        assert_eq!(loaded, task);
        assert_eq!(loaded.description, "Call back");
        assert_eq!(loaded.due_date, due);
        assert!(!loaded.completed);
    }

    #[test]
    fn test_update_unknown_id_leaves_collection_unchanged() {
        let backend = memory();
        let store = DealStore::new(backend.clone());
        store.init().unwrap();
        let before = backend.load_collection(Deal::STORAGE_KEY).unwrap();

        let result = store
            .update(
                999,
                DealPatch {
                    status: Some(DealStatus::Won),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(result.is_none());
        assert_eq!(backend.load_collection(Deal::STORAGE_KEY).unwrap(), before);
    }

    #[test]
    fn test_update_merges_only_provided_fields() {
        let store = ContactStore::new(memory());
        store.init().unwrap();
        let original = store.get_by_id(1).unwrap().unwrap();

        let updated = store
            .update(
                1,
                ContactPatch {
                    phone: Some(Some("555-0000".into())),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("555-0000"));
        assert_eq!(updated.name, original.name);
        assert_eq!(updated.email, original.email);
        assert_eq!(store.get_by_id(1).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_get_all_is_idempotent() {
        let store = TaskStore::new(memory());
        store.init().unwrap();
        assert_eq!(store.get_all().unwrap(), store.get_all().unwrap());
    }

    #[test]
    fn test_get_by_id_missing_is_none() {
        let store = ContactStore::new(memory());
        store.init().unwrap();
        assert!(store.get_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_delete_absent_id_is_noop() {
        let store = TaskStore::new(memory());
        store.init().unwrap();
        let before = store.get_all().unwrap();

        assert!(store.delete(999).unwrap());
        assert_eq!(store.get_all().unwrap(), before);

        assert!(store.delete(1).unwrap());
        assert_eq!(store.get_all().unwrap().len(), before.len() - 1);
        assert!(store.get_by_id(1).unwrap().is_none());
    }

    #[test]
    fn test_init_never_overwrites_existing_collection() {
        let backend = memory();
        backend.save_collection(Contact::STORAGE_KEY, "[]").unwrap();

        let store = ContactStore::new(backend);
        assert!(!store.init().unwrap());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_uninitialized_store_reads_empty() {
        let store = DealStore::new(memory());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let store = DealStore::new(memory());
        let err = store
            .create(NewDeal {
                name: "Bad".into(),
                contact_id: Some(1),
                value: -1.0,
                ..Default::default()
            })
            .unwrap_err();

        let errors = err.downcast_ref::<ValidationErrors>().unwrap();
        assert_eq!(errors.get("value"), Some("Value must be greater than 0"));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_replace_missing_record_is_none() {
        let store = DealStore::new(memory());
        let deal = store.create(new_deal("Only")).unwrap();
        store.delete(deal.id).unwrap();
        assert!(store.replace(deal).unwrap().is_none());
    }

    #[test]
    fn test_json_backend_persists_across_store_instances() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend: Arc<dyn DatabaseBackend> = Arc::new(JsonBackend::new(temp_dir.path()));
            let stores = Stores::new(backend, Latency::NONE);
            stores.init().unwrap();
            stores.deals.create(new_deal("Persisted")).unwrap();
        }

        let backend: Arc<dyn DatabaseBackend> = Arc::new(JsonBackend::new(temp_dir.path()));
        let stores = Stores::new(backend, Latency::NONE);
        stores.init().unwrap();
        let deals = stores.deals.get_all().unwrap();
        assert_eq!(deals.len(), 6);
        assert_eq!(deals[5].name, "Persisted");
    }

    #[test]
    fn test_missing_timestamps_read_the_same_every_time() {
        let backend = memory();
        backend
            .save_collection(Contact::STORAGE_KEY, r#"[{"Id":1,"name":"Jane Doe"}]"#)
            .unwrap();
        let store = ContactStore::new(backend);

        let first = store.get_all().unwrap();
        let second = store.get_all().unwrap();
        assert_eq!(first, second);
        assert!(first[0].created_at.to_rfc3339().starts_with("1970-01-01"));
    }

    #[test]
    fn test_demo_latency_profile() {
        let demo = LatencyProfile::Demo.latency();
        assert_eq!(demo, Latency::demo());
        for delay in [demo.list, demo.get, demo.write, demo.delete] {
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(300));
        }
        assert_eq!(LatencyProfile::None.latency(), Latency::NONE);
    }
}
