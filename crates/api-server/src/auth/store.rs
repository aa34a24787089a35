//! File-backed auth store: users, organizations, memberships.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crm_core::permission::Role;
use crm_core::{Error, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Organization {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Membership {
    id: Uuid,
    user_id: Uuid,
    organization_id: Uuid,
    role: Role,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AuthState {
    users: HashMap<Uuid, User>,
    organizations: HashMap<Uuid, Organization>,
    memberships: HashMap<Uuid, Membership>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAuthState {
    users: Vec<User>,
    organizations: Vec<Organization>,
    memberships: Vec<Membership>,
}

impl From<StoredAuthState> for AuthState {
    fn from(value: StoredAuthState) -> Self {
        Self {
            users: value.users.into_iter().map(|item| (item.id, item)).collect(),
            organizations: value
                .organizations
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
            memberships: value
                .memberships
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
        }
    }
}

impl From<&AuthState> for StoredAuthState {
    fn from(value: &AuthState) -> Self {
        Self {
            users: value.users.values().cloned().collect(),
            organizations: value.organizations.values().cloned().collect(),
            memberships: value.memberships.values().cloned().collect(),
        }
    }
}

/// Thread-safe auth store with file persistence
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<RwLock<AuthState>>,
    file_path: PathBuf,
}

impl AuthStore {
    pub async fn new(file_path: PathBuf) -> Result<Self> {
        let state = load_state(&file_path).await?;
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            file_path,
        })
    }

    /// Register a user together with a fresh organization; the registrant
    /// becomes its owner.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        org_name: &str,
    ) -> Result<(UserSummary, OrganizationSummary)> {
        let normalized_email = normalize_email(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Name cannot be empty".to_string()));
        }
        let org_name = org_name.trim();
        if org_name.is_empty() {
            return Err(Error::Validation(
                "Organization name cannot be empty".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if state.users.values().any(|user| user.email == normalized_email) {
            return Err(Error::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: normalized_email,
            name: name.to_string(),
            password_hash: hash_password(password),
            created_at: now,
        };
        let org = Organization {
            id: Uuid::new_v4(),
            name: org_name.to_string(),
            created_at: now,
        };
        let membership = Membership {
            id: Uuid::new_v4(),
            user_id: user.id,
            organization_id: org.id,
            role: Role::Owner,
            created_at: now,
        };

        state.users.insert(user.id, user.clone());
        state.organizations.insert(org.id, org.clone());
        state.memberships.insert(membership.id, membership);
        persist_state(&self.file_path, &state).await?;
        tracing::info!("Registered user {} as owner of org {}", user.id, org.id);

        Ok((user_to_summary(&user), organization_to_summary(&org)))
    }

    /// Verify credentials. Invalid email and invalid password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserSummary> {
        let normalized_email = normalize_email(email)
            .map_err(|_| Error::Authentication("Invalid credentials".to_string()))?;
        let state = self.state.read().await;
        let user = state
            .users
            .values()
            .find(|user| user.email == normalized_email)
            .ok_or_else(|| Error::Authentication("Invalid credentials".to_string()))?;
        if !verify_password(&user.password_hash, password) {
            return Err(Error::Authentication("Invalid credentials".to_string()));
        }
        Ok(user_to_summary(user))
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserSummary> {
        let state = self.state.read().await;
        state
            .users
            .get(&user_id)
            .map(user_to_summary)
            .ok_or_else(|| Error::Authentication("User not found".to_string()))
    }

    /// Membership of a user in an organization; denial reads as an
    /// authorization failure, not a missing resource.
    pub async fn membership(&self, user_id: Uuid, organization_id: Uuid) -> Result<MembershipRecord> {
        let state = self.state.read().await;
        state
            .memberships
            .values()
            .find(|membership| {
                membership.user_id == user_id && membership.organization_id == organization_id
            })
            .map(membership_to_record)
            .ok_or_else(|| Error::Authorization("Access denied to organization".to_string()))
    }

    pub async fn list_organizations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(OrganizationSummary, Role)>> {
        let state = self.state.read().await;
        let mut orgs = Vec::new();
        for membership in state
            .memberships
            .values()
            .filter(|membership| membership.user_id == user_id)
        {
            if let Some(org) = state.organizations.get(&membership.organization_id) {
                orgs.push((organization_to_summary(org), membership.role));
            }
        }
        orgs.sort_by(|left, right| left.0.name.cmp(&right.0.name));
        Ok(orgs)
    }

    /// Attach an existing user to an organization with a role; used by
    /// tests and by future invite flows.
    pub async fn add_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> Result<MembershipRecord> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(Error::NotFound("User not found".to_string()));
        }
        if !state.organizations.contains_key(&organization_id) {
            return Err(Error::NotFound("Organization not found".to_string()));
        }
        if state.memberships.values().any(|membership| {
            membership.user_id == user_id && membership.organization_id == organization_id
        }) {
            return Err(Error::Conflict(
                "User is already a member of the organization".to_string(),
            ));
        }

        let membership = Membership {
            id: Uuid::new_v4(),
            user_id,
            organization_id,
            role,
            created_at: Utc::now(),
        };
        state.memberships.insert(membership.id, membership.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(membership_to_record(&membership))
    }
}

fn user_to_summary(user: &User) -> UserSummary {
    UserSummary {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        created_at: user.created_at,
    }
}

fn organization_to_summary(org: &Organization) -> OrganizationSummary {
    OrganizationSummary {
        id: org.id,
        name: org.name.clone(),
        created_at: org.created_at,
    }
}

fn membership_to_record(membership: &Membership) -> MembershipRecord {
    MembershipRecord {
        id: membership.id,
        user_id: membership.user_id,
        organization_id: membership.organization_id,
        role: membership.role,
        created_at: membership.created_at,
    }
}

async fn load_state(path: &Path) -> Result<AuthState> {
    if !path.exists() {
        return Ok(AuthState::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| Error::Storage(format!("Failed to read auth state: {}", err)))?;
    if content.trim().is_empty() {
        return Ok(AuthState::default());
    }
    let stored: StoredAuthState = serde_json::from_str(&content)
        .map_err(|err| Error::Storage(format!("Failed to parse auth state: {}", err)))?;
    Ok(stored.into())
}

async fn persist_state(path: &Path, state: &AuthState) -> Result<()> {
    let content = serde_json::to_string_pretty(&StoredAuthState::from(state))
        .map_err(|err| Error::Storage(format!("Failed to serialize auth state: {}", err)))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| Error::Storage(format!("Failed to create auth dir: {}", err)))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|err| Error::Storage(format!("Failed to write auth state: {}", err)))?;
    Ok(())
}

fn normalize_email(email: &str) -> Result<String> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(Error::Validation("Invalid email".to_string()));
    }
    Ok(normalized)
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(Error::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> String {
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    format!(
        "v1${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

fn verify_password(stored_hash: &str, password: &str) -> bool {
    let mut parts = stored_hash.split('$');
    let version = parts.next();
    let encoded_salt = parts.next();
    let encoded_digest = parts.next();
    if version != Some("v1") || encoded_salt.is_none() || encoded_digest.is_none() {
        return false;
    }

    let salt = match URL_SAFE_NO_PAD.decode(encoded_salt.unwrap()) {
        Ok(value) => value,
        Err(_) => return false,
    };
    let expected_digest = match URL_SAFE_NO_PAD.decode(encoded_digest.unwrap()) {
        Ok(value) => value,
        Err(_) => return false,
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    let actual_digest = hasher.finalize();
    expected_digest == actual_digest.as_slice()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn build_store() -> (AuthStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = AuthStore::new(temp_dir.path().join("auth.json")).await.unwrap();
        (store, temp_dir)
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("verysecurepw");
        assert!(verify_password(&hash, "verysecurepw"));
        assert!(!verify_password(&hash, "verysecurepW"));
        assert!(!verify_password(&hash, ""));
        assert!(!verify_password("garbage", "verysecurepw"));
    }

    #[tokio::test]
    async fn register_creates_owner_membership() {
        let (store, _tmp) = build_store().await;
        let (user, org) = store
            .register("owner@example.com", "verysecurepw", "Owner", "Acme")
            .await
            .unwrap();

        let membership = store.membership(user.id, org.id).await.unwrap();
        assert_eq!(membership.role, Role::Owner);

        let orgs = store.list_organizations_for_user(user.id).await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].0.name, "Acme");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (store, _tmp) = build_store().await;
        store
            .register("owner@example.com", "verysecurepw", "Owner", "Acme")
            .await
            .unwrap();
        let err = store
            .register("Owner@Example.com", "otherpassword", "Other", "Beta")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn authenticate_rejects_bad_credentials() {
        let (store, _tmp) = build_store().await;
        store
            .register("owner@example.com", "verysecurepw", "Owner", "Acme")
            .await
            .unwrap();

        assert!(store
            .authenticate("owner@example.com", "verysecurepw")
            .await
            .is_ok());
        assert!(matches!(
            store
                .authenticate("owner@example.com", "wrongpassword")
                .await
                .unwrap_err(),
            Error::Authentication(_)
        ));
        assert!(matches!(
            store
                .authenticate("nobody@example.com", "verysecurepw")
                .await
                .unwrap_err(),
            Error::Authentication(_)
        ));
    }

    #[tokio::test]
    async fn membership_denial_is_an_authorization_error() {
        let (store, _tmp) = build_store().await;
        let (user, _org) = store
            .register("owner@example.com", "verysecurepw", "Owner", "Acme")
            .await
            .unwrap();
        let err = store.membership(user.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
    }

    #[tokio::test]
    async fn state_survives_a_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("auth.json");
        {
            let store = AuthStore::new(path.clone()).await.unwrap();
            store
                .register("owner@example.com", "verysecurepw", "Owner", "Acme")
                .await
                .unwrap();
        }

        let reloaded = AuthStore::new(path).await.unwrap();
        let user = reloaded
            .authenticate("owner@example.com", "verysecurepw")
            .await
            .unwrap();
        assert_eq!(user.email, "owner@example.com");
    }
}
