//! Deal model definitions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    New,
    InProgress,
    Won,
    Lost,
}

impl DealStatus {
    /// Open deals are the ones counted by the funnel view.
    pub fn is_open(self) -> bool {
        matches!(self, Self::New | Self::InProgress)
    }
}

/// Deal stage. Stages carry a fixed total order used to distinguish forward
/// progress from rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Qualification,
    Proposal,
    Negotiation,
    Closed,
}

impl DealStage {
    pub fn order(self) -> u8 {
        match self {
            Self::Qualification => 0,
            Self::Proposal => 1,
            Self::Negotiation => 2,
            Self::Closed => 3,
        }
    }

    pub const ALL: [DealStage; 4] = [
        Self::Qualification,
        Self::Proposal,
        Self::Negotiation,
        Self::Closed,
    ];
}

/// An organization-scoped deal. `organization_id` never changes after
/// creation; `updated_at` changes on any mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contact_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: DealStatus,
    pub stage: DealStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Create a new deal. Deals always start as new/qualification.
    pub fn new(
        organization_id: Uuid,
        contact_id: Uuid,
        owner_id: Uuid,
        title: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            contact_id,
            owner_id,
            title: title.into(),
            amount,
            currency: currency.into(),
            status: DealStatus::New,
            stage: DealStage::Qualification,
            created_at: now,
            updated_at: now,
        }
    }
}
