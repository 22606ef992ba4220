//! Role-based capability checks applied at the command boundary.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Pharmacist,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewCabinet,
    ConsumeDose,
    PlaceOrder,
    ManageInventory,
    RunScheduler,
}

impl Role {
    pub fn can(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Patient => matches!(capability, ViewCabinet | ConsumeDose | PlaceOrder),
            Role::Pharmacist => matches!(
                capability,
                ViewCabinet | PlaceOrder | ManageInventory | RunScheduler
            ),
        }
    }
}

pub fn authorize(role: Role, capability: Capability) -> Result<()> {
    if role.can(capability) {
        Ok(())
    } else {
        tracing::warn!("{:?} denied {:?}", role, capability);
        Err(Error::Forbidden(format!(
            "{:?} role cannot {:?}",
            role, capability
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_capabilities() {
        assert!(authorize(Role::Patient, Capability::ConsumeDose).is_ok());
        assert!(authorize(Role::Patient, Capability::ViewCabinet).is_ok());
        assert!(matches!(
            authorize(Role::Patient, Capability::ManageInventory),
            Err(Error::Forbidden(_))
        ));
        assert!(authorize(Role::Patient, Capability::RunScheduler).is_err());
    }

    #[test]
    fn test_pharmacist_capabilities() {
        assert!(authorize(Role::Pharmacist, Capability::ManageInventory).is_ok());
        assert!(authorize(Role::Pharmacist, Capability::RunScheduler).is_ok());
        assert!(authorize(Role::Pharmacist, Capability::ConsumeDose).is_err());
    }
}
