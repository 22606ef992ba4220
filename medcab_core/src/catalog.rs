//! Default formulary and demo store.
//!
//! This module provides the built-in medicines used to seed a fresh store.

use crate::types::*;
use crate::PharmacyStore;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use uuid::Uuid;

/// Patient created by the demo seed
pub const DEMO_PATIENT_ID: &str = "demo_patient";

/// Cached default formulary - built once and reused
static DEFAULT_FORMULARY: Lazy<Vec<Medicine>> = Lazy::new(build_default_formulary);

/// Get a reference to the cached default formulary
pub fn default_formulary() -> &'static [Medicine] {
    &DEFAULT_FORMULARY
}

fn medicine(
    id: &str,
    name: &str,
    strength: &str,
    stock: u32,
    prescription_required: bool,
    price: f64,
) -> Medicine {
    Medicine {
        id: id.into(),
        name: name.into(),
        strength: Some(strength.into()),
        unit_type: Some("tablet".into()),
        stock,
        reorder_threshold: None,
        prescription_required,
        price: Some(price),
        description: None,
    }
}

fn build_default_formulary() -> Vec<Medicine> {
    vec![
        medicine("paracetamol_500", "Paracetamol", "500mg", 240, false, 1.5),
        medicine("ibuprofen_400", "Ibuprofen", "400mg", 120, false, 2.0),
        medicine("cetirizine_10", "Cetirizine", "10mg", 8, false, 1.2),
        medicine("amoxicillin_500", "Amoxicillin", "500mg", 60, true, 6.5),
        medicine("metformin_500", "Metformin", "500mg", 90, true, 3.0),
        Medicine {
            reorder_threshold: Some(20),
            ..medicine("omeprazole_20", "Omeprazole", "20mg", 15, false, 4.0)
        },
        Medicine {
            unit_type: Some("bottle".into()),
            ..medicine("salbutamol_inh", "Salbutamol Inhaler", "100mcg", 0, true, 12.0)
        },
    ]
}

/// Build a store holding the formulary, one demo patient with a
/// prescription on file, and one fulfilled order placed 25 days before `now`
pub fn seed_demo_store(now: DateTime<Utc>) -> PharmacyStore {
    let mut store = PharmacyStore {
        medicines: default_formulary().to_vec(),
        ..Default::default()
    };

    store.patients.push(Patient {
        id: DEMO_PATIENT_ID.into(),
        name: "Demo Patient".into(),
    });

    store.prescriptions.push(PrescriptionRecord {
        id: Uuid::new_v4(),
        patient_id: DEMO_PATIENT_ID.into(),
        extracted_text: Some("Rx: Amoxicillin 500mg three times daily for 7 days".into()),
        uploaded_at: now - Duration::days(26),
    });

    let placed = now - Duration::days(25);
    let order = Order {
        id: Uuid::new_v4(),
        patient_id: DEMO_PATIENT_ID.into(),
        status: OrderStatus::Fulfilled,
        channel: "web".into(),
        created_at: placed,
        finalized_at: Some(placed),
    };

    let lines = [
        ("paracetamol_500", 15, "After meals", 3),
        ("ibuprofen_400", 10, "As needed for pain", 0),
        ("cetirizine_10", 10, "Once daily at bedtime", 1),
    ];

    for (medicine_id, qty, dosage, frequency) in lines {
        let medicine = store.medicine(medicine_id).map(Medicine::to_ref);
        store.order_items.push(OrderItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            medicine,
            qty,
            dosage_text: Some(dosage.into()),
            frequency_per_day: frequency,
            days_supply: Some(30),
            created_at: placed,
        });
    }

    store.orders.push(order);

    tracing::info!(
        "Seeded demo store with {} medicines and {} order items",
        store.medicines.len(),
        store.order_items.len()
    );
    store
}
