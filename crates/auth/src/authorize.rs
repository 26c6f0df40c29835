use thiserror::Error;

use fabdesk_core::{DomainError, MachineType, UserId};

use crate::Actor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("admin role required")]
    AdminRequired,

    #[error("machine {0} is not allowed for this user")]
    MachineNotAllowed(MachineType),

    #[error("only the creator or an admin can access this resource")]
    NotOwner,
}

impl From<AuthzError> for DomainError {
    fn from(e: AuthzError) -> Self {
        DomainError::unauthorized(e.to_string())
    }
}

/// Pure policy check: no IO, no panics.
pub fn require_admin(actor: &Actor) -> Result<(), AuthzError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

pub fn require_machine(actor: &Actor, machine: MachineType) -> Result<(), AuthzError> {
    if actor.can_use_machine(machine) {
        Ok(())
    } else {
        Err(AuthzError::MachineNotAllowed(machine))
    }
}

/// Employees only see and touch what they created.
pub fn require_owner_or_admin(actor: &Actor, owner: UserId) -> Result<(), AuthzError> {
    if actor.is_admin() || actor.user_id == owner {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_is_not_admin() {
        let emp = Actor::employee(UserId::new(), []);
        assert_eq!(require_admin(&emp), Err(AuthzError::AdminRequired));
        assert!(require_admin(&Actor::admin(UserId::new())).is_ok());
    }

    #[test]
    fn machine_denial_names_the_machine() {
        let emp = Actor::employee(UserId::new(), [MachineType::Cnc]);
        let err = require_machine(&emp, MachineType::Panneaux).unwrap_err();
        assert_eq!(err.to_string(), "machine PANNEAUX is not allowed for this user");
    }

    #[test]
    fn ownership_check_lets_admins_through() {
        let owner = UserId::new();
        let other = Actor::employee(UserId::new(), []);
        assert_eq!(require_owner_or_admin(&other, owner), Err(AuthzError::NotOwner));
        assert!(require_owner_or_admin(&Actor::employee(owner, []), owner).is_ok());
        assert!(require_owner_or_admin(&Actor::admin(UserId::new()), owner).is_ok());
    }

    #[test]
    fn converts_to_unauthorized_domain_error() {
        let err: DomainError = AuthzError::AdminRequired.into();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
