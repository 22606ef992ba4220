//! Pharmacy store snapshot with file locking.
//!
//! The store holds the tables the cabinet logic reads (medicines, patients,
//! orders, order items, prescription records). It is persisted as a single
//! JSON document, read under a shared lock and replaced atomically on save.
//! Read-modify-write goes through [`PharmacyStore::update`] or
//! [`PharmacyStore::record_doses`], which hold the data lock throughout.

use crate::events::ChangePublisher;
use crate::scheduler::SchedulerState;
use crate::snapshot::{self, DataLock};
use crate::wal::DoseJournal;
use crate::{
    DoseEvent, Error, Medicine, Order, OrderItem, OrderStatus, Patient, PrescriptionRecord, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// In-memory copy of the pharmacy tables
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PharmacyStore {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionRecord>,
    /// Dose windows already deducted, saved with the quantities they changed
    #[serde(default)]
    pub scheduler: SchedulerState,
    #[serde(skip)]
    pub(crate) feed: Option<ChangePublisher>,
}

impl PharmacyStore {
    pub fn medicine(&self, id: &str) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == id)
    }

    pub(crate) fn medicine_mut(&mut self, id: &str) -> Option<&mut Medicine> {
        self.medicines.iter_mut().find(|m| m.id == id)
    }

    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn item(&self, id: Uuid) -> Option<&OrderItem> {
        self.order_items.iter().find(|i| i.id == id)
    }

    pub(crate) fn item_mut(&mut self, id: Uuid) -> Option<&mut OrderItem> {
        self.order_items.iter_mut().find(|i| i.id == id)
    }

    /// Status of every order keyed by id
    pub fn order_statuses(&self) -> HashMap<Uuid, OrderStatus> {
        self.orders.iter().map(|o| (o.id, o.status)).collect()
    }

    /// Orders owned by a patient, oldest first
    pub fn patient_orders(&self, patient_id: &str) -> Vec<&Order> {
        let mut orders: Vec<_> = self
            .orders
            .iter()
            .filter(|o| o.patient_id == patient_id)
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Items of a patient's orders, oldest first
    pub fn patient_items(&self, patient_id: &str) -> Vec<&OrderItem> {
        let order_ids: HashSet<Uuid> = self
            .orders
            .iter()
            .filter(|o| o.patient_id == patient_id)
            .map(|o| o.id)
            .collect();

        let mut items: Vec<_> = self
            .order_items
            .iter()
            .filter(|i| order_ids.contains(&i.order_id))
            .collect();
        items.sort_by_key(|i| i.created_at);
        items
    }

    /// Items of fulfilled or approved orders across all patients
    pub fn active_items(&self) -> impl Iterator<Item = &OrderItem> {
        let active: HashSet<Uuid> = self
            .orders
            .iter()
            .filter(|o| o.status.is_active())
            .map(|o| o.id)
            .collect();

        self.order_items
            .iter()
            .filter(move |i| active.contains(&i.order_id))
    }

    /// Prescription records uploaded by a patient
    pub fn patient_prescriptions(&self, patient_id: &str) -> impl Iterator<Item = &PrescriptionRecord> {
        let patient_id = patient_id.to_owned();
        self.prescriptions
            .iter()
            .filter(move |r| r.patient_id == patient_id)
    }

    /// Load a store snapshot
    ///
    /// Returns an empty store if the file doesn't exist. Unlike a missing
    /// file, a corrupt snapshot is an error: overwriting it with an empty
    /// store would lose every order.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(contents) = snapshot::read_shared(path)? else {
            tracing::info!("No store file found at {:?}, starting empty", path);
            return Ok(Self::default());
        };

        let store: PharmacyStore = serde_json::from_str(&contents)
            .map_err(|e| Error::Store(format!("Failed to parse {:?}: {}", path, e)))?;

        tracing::debug!(
            "Loaded store from {:?} ({} medicines, {} orders, {} items)",
            path,
            store.medicines.len(),
            store.orders.len(),
            store.order_items.len()
        );
        Ok(store)
    }

    /// Atomically replace the snapshot at `path`
    ///
    /// Callers that loaded the store first should go through [`update`]
    /// instead so no other writer slips in between.
    ///
    /// [`update`]: PharmacyStore::update
    pub fn save(&self, path: &Path) -> Result<()> {
        snapshot::write_atomic(path, self)?;
        tracing::debug!("Saved store to {:?}", path);
        Ok(())
    }

    /// Load, modify and save the store while holding the data lock
    pub fn update<T, F>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut PharmacyStore) -> Result<T>,
    {
        Self::transact(path, f, |_| Ok(()))
    }

    /// Like [`update`](PharmacyStore::update) for changes that consume
    /// doses: the returned events are journaled before the lock is released
    pub fn record_doses<F>(path: &Path, journal: &DoseJournal, f: F) -> Result<Vec<DoseEvent>>
    where
        F: FnOnce(&mut PharmacyStore) -> Result<Vec<DoseEvent>>,
    {
        Self::transact(path, f, |events| journal.record(events))
    }

    fn transact<T, F, A>(path: &Path, f: F, after_save: A) -> Result<T>
    where
        F: FnOnce(&mut PharmacyStore) -> Result<T>,
        A: FnOnce(&T) -> Result<()>,
    {
        let _lock = DataLock::acquire(path)?;
        let mut store = Self::load(path)?;
        let out = f(&mut store)?;
        store.save(path)?;
        after_save(&out)?;
        Ok(out)
    }
}
