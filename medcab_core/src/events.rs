//! Table-change events and the store reducer.
//!
//! Every mutation of a [`PharmacyStore`] is expressed as a [`TableChange`]
//! and applied through [`PharmacyStore::apply`]. A store can carry a
//! [`ChangePublisher`]; committed changes are then forwarded to the paired
//! [`ChangeSubscriber`], which replays them into another store (for example
//! a display cache) in order.

use crate::{Error, Order, OrderItem, OrderStatus, PharmacyStore, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

/// A single row-level change to the pharmacy tables
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableChange {
    OrderInserted(Order),
    OrderItemInserted(OrderItem),
    OrderStatusChanged {
        order_id: Uuid,
        status: OrderStatus,
        finalized_at: Option<DateTime<Utc>>,
    },
    OrderItemQtyChanged {
        item_id: Uuid,
        qty: u32,
    },
    MedicineStockChanged {
        medicine_id: String,
        stock: u32,
    },
}

impl PharmacyStore {
    /// Reduce one change into the store
    ///
    /// Changes that target missing rows are logged and dropped.
    pub fn apply(&mut self, change: &TableChange) {
        match change {
            TableChange::OrderInserted(order) => {
                if self.order(order.id).is_some() {
                    tracing::warn!("Order {} already present, ignoring insert", order.id);
                } else {
                    self.orders.push(order.clone());
                }
            }
            TableChange::OrderItemInserted(item) => {
                if self.item(item.id).is_some() {
                    tracing::warn!("Order item {} already present, ignoring insert", item.id);
                } else {
                    self.order_items.push(item.clone());
                }
            }
            TableChange::OrderStatusChanged {
                order_id,
                status,
                finalized_at,
            } => match self.orders.iter_mut().find(|o| o.id == *order_id) {
                Some(order) => {
                    order.status = *status;
                    if finalized_at.is_some() {
                        order.finalized_at = *finalized_at;
                    }
                }
                None => tracing::warn!("Status change for unknown order {}", order_id),
            },
            TableChange::OrderItemQtyChanged { item_id, qty } => match self.item_mut(*item_id) {
                Some(item) => item.qty = *qty,
                None => tracing::warn!("Quantity change for unknown order item {}", item_id),
            },
            TableChange::MedicineStockChanged { medicine_id, stock } => {
                match self.medicine_mut(medicine_id) {
                    Some(medicine) => medicine.stock = *stock,
                    None => tracing::warn!("Stock change for unknown medicine {}", medicine_id),
                }
            }
        }
    }

    /// Apply a change and forward it to the attached feed, if any
    pub fn commit(&mut self, change: TableChange) {
        self.apply(&change);

        let closed = self
            .feed
            .as_ref()
            .is_some_and(|feed| feed.publish(change).is_err());
        if closed {
            tracing::warn!("Change feed subscriber dropped, detaching feed");
            self.feed = None;
        }
    }

    /// Forward future commits to `publisher`
    pub fn attach_feed(&mut self, publisher: ChangePublisher) {
        self.feed = Some(publisher);
    }
}

/// Sending half of a change feed
#[derive(Clone, Debug)]
pub struct ChangePublisher {
    tx: Sender<TableChange>,
}

impl ChangePublisher {
    pub fn publish(&self, change: TableChange) -> Result<()> {
        self.tx
            .send(change)
            .map_err(|_| Error::Store("change feed closed".into()))
    }
}

/// Receiving half of a change feed
#[derive(Debug)]
pub struct ChangeSubscriber {
    rx: Receiver<TableChange>,
}

impl ChangeSubscriber {
    /// Apply every pending change to `store`, returning how many were applied
    pub fn drain_into(&self, store: &mut PharmacyStore) -> usize {
        let mut applied = 0;
        for change in self.rx.try_iter() {
            store.apply(&change);
            applied += 1;
        }
        tracing::debug!("Drained {} changes from feed", applied);
        applied
    }

    /// Collect pending changes without applying them
    pub fn pending(&self) -> Vec<TableChange> {
        self.rx.try_iter().collect()
    }
}

/// Create a connected publisher/subscriber pair
pub fn change_feed() -> (ChangePublisher, ChangeSubscriber) {
    let (tx, rx) = mpsc::channel();
    (ChangePublisher { tx }, ChangeSubscriber { rx })
}
