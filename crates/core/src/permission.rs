//! Role and permission evaluation
//!
//! Pure functions deciding resource-mutation rights and stage-rollback
//! rights from the membership role. No side effects; the stores call these
//! before applying any mutation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deal::DealStage;

/// Role attached to a (user, organization) membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Member,
}

impl Role {
    /// Owners and admins hold blanket mutation rights within their organization.
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// Returns true if the user may mutate a resource owned by
/// `resource_owner_id`. Elevated roles always pass; everyone else only
/// touches what they own.
pub fn check_resource_permission(user_id: Uuid, resource_owner_id: Uuid, role: Role) -> bool {
    if role.is_elevated() {
        return true;
    }
    user_id == resource_owner_id
}

/// Stage moves are a one-way ratchet for non-privileged roles: forward or
/// lateral moves are always allowed, backward moves only for owner/admin.
pub fn can_rollback_stage(role: Role, current_stage: DealStage, new_stage: DealStage) -> bool {
    if new_stage.order() >= current_stage.order() {
        return true;
    }
    role.is_elevated()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 4] = [Role::Owner, Role::Admin, Role::Manager, Role::Member];
    const ALL_STAGES: [DealStage; 4] = [
        DealStage::Qualification,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::Closed,
    ];

    #[test]
    fn elevated_roles_pass_regardless_of_owner() {
        let user = Uuid::new_v4();
        let owner = Uuid::new_v4();
        assert!(check_resource_permission(user, owner, Role::Owner));
        assert!(check_resource_permission(user, owner, Role::Admin));
    }

    #[test]
    fn member_passes_only_when_owning_the_resource() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(check_resource_permission(user, user, Role::Member));
        assert!(!check_resource_permission(user, other, Role::Member));
        assert!(check_resource_permission(user, user, Role::Manager));
        assert!(!check_resource_permission(user, other, Role::Manager));
    }

    #[test]
    fn forward_and_lateral_moves_allowed_for_everyone() {
        for role in ALL_ROLES {
            for current in ALL_STAGES {
                for new in ALL_STAGES {
                    if new.order() >= current.order() {
                        assert!(can_rollback_stage(role, current, new));
                    }
                }
            }
        }
    }

    #[test]
    fn backward_moves_require_elevated_role() {
        for role in ALL_ROLES {
            for current in ALL_STAGES {
                for new in ALL_STAGES {
                    if new.order() < current.order() {
                        assert_eq!(can_rollback_stage(role, current, new), role.is_elevated());
                    }
                }
            }
        }
    }

    #[test]
    fn role_round_trips_through_serde() {
        for role in ALL_ROLES {
            let encoded = serde_json::to_string(&role).unwrap();
            let decoded: Role = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, role);
        }
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
        assert!(serde_json::from_str::<Role>("\"host\"").is_err());
    }
}
