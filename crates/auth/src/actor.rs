use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use fabdesk_core::{MachineType, UserId};

use crate::Role;

/// The authenticated user performing an operation.
///
/// Admins may use every machine regardless of `allowed_machines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    #[serde(default)]
    pub allowed_machines: BTreeSet<MachineType>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, allowed_machines: impl IntoIterator<Item = MachineType>) -> Self {
        Self {
            user_id,
            role,
            allowed_machines: allowed_machines.into_iter().collect(),
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin, MachineType::ALL)
    }

    pub fn employee(user_id: UserId, allowed_machines: impl IntoIterator<Item = MachineType>) -> Self {
        Self::new(user_id, Role::Employee, allowed_machines)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_use_machine(&self, machine: MachineType) -> bool {
        self.is_admin() || self.allowed_machines.contains(&machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_can_use_every_machine() {
        let admin = Actor::new(UserId::new(), Role::Admin, []);
        for machine in MachineType::ALL {
            assert!(admin.can_use_machine(machine));
        }
    }

    #[test]
    fn employee_is_limited_to_assigned_machines() {
        let emp = Actor::employee(UserId::new(), [MachineType::Laser]);
        assert!(emp.can_use_machine(MachineType::Laser));
        assert!(!emp.can_use_machine(MachineType::Cnc));
    }
}
