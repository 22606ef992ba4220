//! Regimen classification.
//!
//! As-needed medicines are decremented by the patient pressing "taken";
//! scheduled medicines are deducted automatically at their dose times.

use serde::{Deserialize, Serialize};

/// How a medicine is dosed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regimen {
    AsNeeded,
    Scheduled,
}

const AS_NEEDED_MARKERS: [&str; 2] = ["as needed", "prn"];

/// True for frequency 0 or a dosage label mentioning "as needed" / "prn"
pub fn is_as_needed(frequency: u8, dosage_label: Option<&str>) -> bool {
    if frequency == 0 {
        return true;
    }

    dosage_label
        .map(str::to_lowercase)
        .is_some_and(|label| AS_NEEDED_MARKERS.iter().any(|m| label.contains(m)))
}

pub fn classify(frequency: u8, dosage_label: Option<&str>) -> Regimen {
    if is_as_needed(frequency, dosage_label) {
        Regimen::AsNeeded
    } else {
        Regimen::Scheduled
    }
}
