//! Deal lifecycle transition planning
//!
//! Update requests are validated fully before anything is applied: the
//! planner either returns the updated deal together with the system events
//! it must emit, or the rejection. The store persists deal and events under
//! one write lock, so a rejected transition leaves no side effect.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::activity::ActivityKind;
use crate::error::Error;
use crate::permission::{can_rollback_stage, check_resource_permission, Role};
use crate::Result;

use super::model::{Deal, DealStage, DealStatus};

/// Optional field changes carried by a deal update request.
#[derive(Debug, Clone, Default)]
pub struct DealPatch {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<DealStatus>,
    pub stage: Option<DealStage>,
}

/// Result of a validated transition: the updated deal plus the system
/// events to record, in emission order (stage before status).
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub deal: Deal,
    pub events: Vec<(ActivityKind, serde_json::Value)>,
}

/// Validate a deal update against the caller's identity and role and plan
/// the resulting state.
pub fn plan_update(
    deal: &Deal,
    patch: DealPatch,
    user_id: Uuid,
    role: Role,
) -> Result<TransitionOutcome> {
    if !check_resource_permission(user_id, deal.owner_id, role) {
        return Err(Error::Authorization("Access denied".to_string()));
    }

    let mut updated = deal.clone();
    let mut events = Vec::new();

    if let Some(stage) = patch.stage {
        if stage != deal.stage {
            if !can_rollback_stage(role, deal.stage, stage) {
                return Err(Error::Authorization("Cannot rollback stage".to_string()));
            }
            events.push((
                ActivityKind::StageChanged,
                json!({ "old_stage": deal.stage, "new_stage": stage }),
            ));
            updated.stage = stage;
        }
    }

    if let Some(status) = patch.status {
        if status != deal.status {
            // The won-amount invariant is checked against the current amount;
            // an amount carried by the same request does not rescue it.
            if status == DealStatus::Won && deal.amount <= Decimal::ZERO {
                return Err(Error::Validation(
                    "Won deal must have positive amount".to_string(),
                ));
            }
            events.push((
                ActivityKind::StatusChanged,
                json!({ "old_status": deal.status, "new_status": status }),
            ));
            updated.status = status;
        }
    }

    if let Some(title) = patch.title {
        updated.title = title;
    }
    if let Some(amount) = patch.amount {
        updated.amount = amount;
    }

    updated.updated_at = Utc::now();
    Ok(TransitionOutcome {
        deal: updated,
        events,
    })
}
