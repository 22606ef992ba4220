#![forbid(unsafe_code)]

//! Core domain model and business logic for the Medcab medicine cabinet.
//!
//! This crate provides:
//! - Domain types (medicines, orders, order items, dose events)
//! - Dose schedule calculation and regimen classification
//! - Cabinet aggregation over fulfilled orders
//! - Dose consumption, scheduled deduction, refill and inventory helpers
//! - Persistence (locked store snapshot, dose journal, CSV history)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod schedule;
pub mod regimen;
pub mod cabinet;
pub mod access;
pub mod events;
pub mod snapshot;
pub mod store;
pub mod catalog;
pub mod dosing;
pub mod scheduler;
pub mod refill;
pub mod inventory;
pub mod wal;
pub mod csv_rollup;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use schedule::{next_dose_times, next_dose_times_in, DoseTime, DoseWindow};
pub use regimen::{classify, is_as_needed, Regimen};
pub use cabinet::{build_cabinet, CabinetEntry};
pub use access::{authorize, Capability, Role};
pub use events::{change_feed, ChangePublisher, ChangeSubscriber, TableChange};
pub use store::PharmacyStore;
pub use catalog::seed_demo_store;
pub use dosing::{consume_dose, due_doses, DueDoses};
pub use scheduler::{run_scheduled_decrement, SchedulerState};
pub use refill::{refill_candidates, RefillCandidate};
pub use inventory::{available_medicines, low_stock, place_manual_order, OrderLine};
pub use wal::DoseJournal;
pub use history::load_recent_events;
