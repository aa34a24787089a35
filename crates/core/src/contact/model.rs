//! Contact model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization-scoped contact. The owner is fixed at creation and
/// determines default mutation rights absent an elevated role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(organization_id: Uuid, owner_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            owner_id,
            name: name.into(),
            email: None,
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Case-insensitive substring match over name, email and phone.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if self.name.to_lowercase().contains(&needle) {
            return true;
        }
        if let Some(email) = &self.email {
            if email.to_lowercase().contains(&needle) {
                return true;
            }
        }
        if let Some(phone) = &self.phone {
            if phone.to_lowercase().contains(&needle) {
                return true;
            }
        }
        false
    }
}
