//! File-backed CRM store
//!
//! Holds contacts, deals, tasks and the activity timeline for every
//! organization behind a single `RwLock`, persisted as JSON on every write.
//! All mutation paths run the permission checks and business rules before
//! touching state, so a rejected operation leaves nothing behind.
//!
//! Tenant isolation is enforced by re-checking `organization_id` on every
//! fetched resource; a cross-tenant id is indistinguishable from a missing
//! one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::activity::{Activity, ActivityKind};
use crate::analytics::{DealsSummary, FunnelStage};
use crate::contact::Contact;
use crate::deal::{plan_update, Deal, DealPatch, DealStage, DealStatus};
use crate::error::Error;
use crate::permission::{check_resource_permission, Role};
use crate::task::Task;
use crate::Result;

#[derive(Debug, Default)]
struct CrmState {
    contacts: HashMap<Uuid, Contact>,
    deals: HashMap<Uuid, Deal>,
    tasks: HashMap<Uuid, Task>,
    activities: Vec<Activity>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCrmState {
    contacts: Vec<Contact>,
    deals: Vec<Deal>,
    tasks: Vec<Task>,
    activities: Vec<Activity>,
}

impl From<StoredCrmState> for CrmState {
    fn from(value: StoredCrmState) -> Self {
        Self {
            contacts: value
                .contacts
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
            deals: value.deals.into_iter().map(|item| (item.id, item)).collect(),
            tasks: value.tasks.into_iter().map(|item| (item.id, item)).collect(),
            activities: value.activities,
        }
    }
}

impl From<&CrmState> for StoredCrmState {
    fn from(value: &CrmState) -> Self {
        Self {
            contacts: value.contacts.values().cloned().collect(),
            deals: value.deals.values().cloned().collect(),
            tasks: value.tasks.values().cloned().collect(),
            activities: value.activities.clone(),
        }
    }
}

/// Thread-safe CRM store with file persistence
#[derive(Clone)]
pub struct CrmStore {
    state: Arc<RwLock<CrmState>>,
    file_path: PathBuf,
}

impl CrmStore {
    pub async fn new(file_path: PathBuf) -> Result<Self> {
        let state = load_state(&file_path).await?;
        info!(
            "Loaded CRM state: {} contacts, {} deals, {} tasks, {} activities",
            state.contacts.len(),
            state.deals.len(),
            state.tasks.len(),
            state.activities.len()
        );
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            file_path,
        })
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub async fn create_contact(
        &self,
        organization_id: Uuid,
        owner_id: Uuid,
        name: &str,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<Contact> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Contact name cannot be empty".to_string()));
        }

        let mut contact = Contact::new(organization_id, owner_id, name);
        if let Some(email) = email {
            contact = contact.with_email(email);
        }
        if let Some(phone) = phone {
            contact = contact.with_phone(phone);
        }

        let mut state = self.state.write().await;
        state.contacts.insert(contact.id, contact.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(contact)
    }

    pub async fn list_contacts(
        &self,
        organization_id: Uuid,
        limit: usize,
        offset: usize,
        search: Option<&str>,
    ) -> Result<(Vec<Contact>, usize)> {
        let state = self.state.read().await;
        let mut contacts: Vec<Contact> = state
            .contacts
            .values()
            .filter(|contact| contact.organization_id == organization_id)
            .filter(|contact| match search {
                Some(needle) => contact.matches_search(needle),
                None => true,
            })
            .cloned()
            .collect();
        contacts.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        let total = contacts.len();
        let page = contacts.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    pub async fn get_contact(&self, contact_id: Uuid, organization_id: Uuid) -> Result<Contact> {
        let state = self.state.read().await;
        contact_in_org(&state, contact_id, organization_id).cloned()
    }

    pub async fn update_contact(
        &self,
        contact_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<Contact> {
        let mut state = self.state.write().await;
        let current = contact_in_org(&state, contact_id, organization_id)?.clone();
        if !check_resource_permission(user_id, current.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        let mut updated = current;
        if let Some(name) = name {
            updated.name = name;
        }
        if let Some(email) = email {
            updated.email = Some(email);
        }
        if let Some(phone) = phone {
            updated.phone = Some(phone);
        }
        updated.updated_at = Utc::now();

        state.contacts.insert(updated.id, updated.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(updated)
    }

    pub async fn delete_contact(
        &self,
        contact_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let contact = contact_in_org(&state, contact_id, organization_id)?.clone();
        if !check_resource_permission(user_id, contact.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        let has_active_deals = state
            .deals
            .values()
            .any(|deal| deal.contact_id == contact_id && deal.status.is_open());
        if has_active_deals {
            return Err(Error::Conflict(
                "Cannot delete contact with active deals".to_string(),
            ));
        }

        state.contacts.remove(&contact_id);
        persist_state(&self.file_path, &state).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deals
    // ------------------------------------------------------------------

    pub async fn create_deal(
        &self,
        organization_id: Uuid,
        contact_id: Uuid,
        owner_id: Uuid,
        title: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<Deal> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Deal title cannot be empty".to_string()));
        }

        let mut state = self.state.write().await;
        let contact = state
            .contacts
            .get(&contact_id)
            .ok_or_else(|| Error::NotFound("Contact not found".to_string()))?;
        if contact.organization_id != organization_id {
            return Err(Error::Validation(
                "Contact does not belong to organization".to_string(),
            ));
        }

        let deal = Deal::new(organization_id, contact_id, owner_id, title, amount, currency);
        state.deals.insert(deal.id, deal.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(deal)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn list_deals(
        &self,
        organization_id: Uuid,
        limit: usize,
        offset: usize,
        status: Option<DealStatus>,
        stage: Option<DealStage>,
        owner_id: Option<Uuid>,
    ) -> Result<(Vec<Deal>, usize)> {
        let state = self.state.read().await;
        let mut deals: Vec<Deal> = state
            .deals
            .values()
            .filter(|deal| deal.organization_id == organization_id)
            .filter(|deal| status.map_or(true, |wanted| deal.status == wanted))
            .filter(|deal| stage.map_or(true, |wanted| deal.stage == wanted))
            .filter(|deal| owner_id.map_or(true, |wanted| deal.owner_id == wanted))
            .cloned()
            .collect();
        deals.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        let total = deals.len();
        let page = deals.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    pub async fn get_deal(&self, deal_id: Uuid, organization_id: Uuid) -> Result<Deal> {
        let state = self.state.read().await;
        deal_in_org(&state, deal_id, organization_id).cloned()
    }

    /// Apply a validated update to a deal, recording the emitted system
    /// activities before the updated row, all under one write lock.
    pub async fn update_deal(
        &self,
        deal_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
        patch: DealPatch,
    ) -> Result<Deal> {
        let mut state = self.state.write().await;
        let current = deal_in_org(&state, deal_id, organization_id)?.clone();

        let outcome = plan_update(&current, patch, user_id, role)?;
        for (kind, payload) in outcome.events {
            state.activities.push(Activity::system(deal_id, kind, payload));
        }
        state.deals.insert(deal_id, outcome.deal.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(outcome.deal)
    }

    /// Deleting a deal is terminal: its tasks and activities go with it.
    pub async fn delete_deal(
        &self,
        deal_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let deal = deal_in_org(&state, deal_id, organization_id)?.clone();
        if !check_resource_permission(user_id, deal.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        state.deals.remove(&deal_id);
        state.tasks.retain(|_, task| task.deal_id != deal_id);
        state.activities.retain(|activity| activity.deal_id != deal_id);
        persist_state(&self.file_path, &state).await?;
        debug!("Deleted deal {} with its tasks and activities", deal_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timeline
    // ------------------------------------------------------------------

    pub async fn create_comment(
        &self,
        deal_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Activity> {
        let mut state = self.state.write().await;
        let deal = deal_in_org(&state, deal_id, organization_id)?.clone();
        if !check_resource_permission(user_id, deal.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        let activity = Activity::comment(deal_id, user_id, content);
        state.activities.push(activity.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(activity)
    }

    /// Full timeline for a deal, newest first.
    pub async fn list_activities(
        &self,
        deal_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Vec<Activity>> {
        let state = self.state.read().await;
        let deal = deal_in_org(&state, deal_id, organization_id)?;
        if !check_resource_permission(user_id, deal.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        let mut activities: Vec<Activity> = state
            .activities
            .iter()
            .filter(|activity| activity.deal_id == deal_id)
            .cloned()
            .collect();
        activities.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(activities)
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_task(
        &self,
        deal_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
        title: &str,
        description: Option<String>,
        due_date: NaiveDate,
    ) -> Result<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Task title cannot be empty".to_string()));
        }

        let mut state = self.state.write().await;
        let deal = deal_in_org(&state, deal_id, organization_id)?.clone();
        if !check_resource_permission(user_id, deal.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }
        // Members are held to a stricter rule than the generic check: they
        // may only create tasks on deals they own.
        if role == Role::Member && user_id != deal.owner_id {
            return Err(Error::Authorization(
                "Members can only create tasks for their own deals".to_string(),
            ));
        }
        if due_date < Utc::now().date_naive() {
            return Err(Error::Validation(
                "Due date cannot be in the past".to_string(),
            ));
        }

        let mut task = Task::new(deal_id, title, due_date);
        if let Some(description) = description {
            task = task.with_description(description);
        }

        state.activities.push(Activity::system(
            deal_id,
            ActivityKind::TaskCreated,
            serde_json::json!({ "task_id": task.id, "title": task.title }),
        ));
        state.tasks.insert(task.id, task.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(task)
    }

    pub async fn list_tasks(
        &self,
        organization_id: Uuid,
        deal_id: Option<Uuid>,
        only_open: bool,
    ) -> Result<Vec<Task>> {
        let state = self.state.read().await;
        let Some(deal_id) = deal_id else {
            return Ok(Vec::new());
        };
        deal_in_org(&state, deal_id, organization_id)?;

        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.deal_id == deal_id)
            .filter(|task| !only_open || !task.is_done)
            .cloned()
            .collect();
        tasks.sort_by(|left, right| left.due_date.cmp(&right.due_date));
        Ok(tasks)
    }

    pub async fn get_task(&self, task_id: Uuid, organization_id: Uuid) -> Result<Task> {
        let state = self.state.read().await;
        task_in_org(&state, task_id, organization_id).map(|(task, _)| task.clone())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_task(
        &self,
        task_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
        title: Option<String>,
        description: Option<String>,
        due_date: Option<NaiveDate>,
        is_done: Option<bool>,
    ) -> Result<Task> {
        let mut state = self.state.write().await;
        let (task, deal) = task_in_org(&state, task_id, organization_id)?;
        let (mut updated, deal_owner) = (task.clone(), deal.owner_id);
        if !check_resource_permission(user_id, deal_owner, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        if let Some(title) = title {
            updated.title = title;
        }
        if let Some(description) = description {
            updated.description = Some(description);
        }
        if let Some(due_date) = due_date {
            updated.due_date = due_date;
        }
        if let Some(is_done) = is_done {
            updated.is_done = is_done;
        }
        updated.updated_at = Utc::now();

        state.tasks.insert(updated.id, updated.clone());
        persist_state(&self.file_path, &state).await?;
        Ok(updated)
    }

    pub async fn delete_task(
        &self,
        task_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let (_, deal) = task_in_org(&state, task_id, organization_id)?;
        if !check_resource_permission(user_id, deal.owner_id, role) {
            return Err(Error::Authorization("Access denied".to_string()));
        }

        state.tasks.remove(&task_id);
        persist_state(&self.file_path, &state).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Aggregations
    // ------------------------------------------------------------------

    pub async fn deals_summary(&self, organization_id: Uuid) -> Result<DealsSummary> {
        let state = self.state.read().await;
        let mut summary = DealsSummary::default();

        for deal in state
            .deals
            .values()
            .filter(|deal| deal.organization_id == organization_id)
        {
            summary.total_count += 1;
            summary.total_amount += deal.amount;
            match deal.status {
                DealStatus::New => summary.new_count += 1,
                DealStatus::InProgress => summary.in_progress_count += 1,
                DealStatus::Won => {
                    summary.won_count += 1;
                    summary.won_amount += deal.amount;
                }
                DealStatus::Lost => summary.lost_count += 1,
            }
        }

        if summary.won_count > 0 {
            summary.average_won_amount = summary.won_amount / Decimal::from(summary.won_count);
        }
        Ok(summary)
    }

    /// Distribution of open deals (status new/in_progress) across stages,
    /// reported for every stage in stage order.
    pub async fn deals_funnel(&self, organization_id: Uuid) -> Result<Vec<FunnelStage>> {
        let state = self.state.read().await;
        let mut funnel: Vec<FunnelStage> = DealStage::ALL
            .iter()
            .map(|stage| FunnelStage {
                stage: *stage,
                count: 0,
            })
            .collect();

        for deal in state
            .deals
            .values()
            .filter(|deal| deal.organization_id == organization_id && deal.status.is_open())
        {
            funnel[deal.stage.order() as usize].count += 1;
        }
        Ok(funnel)
    }
}

fn contact_in_org(state: &CrmState, contact_id: Uuid, organization_id: Uuid) -> Result<&Contact> {
    state
        .contacts
        .get(&contact_id)
        .filter(|contact| contact.organization_id == organization_id)
        .ok_or_else(|| Error::NotFound("Contact not found".to_string()))
}

fn deal_in_org(state: &CrmState, deal_id: Uuid, organization_id: Uuid) -> Result<&Deal> {
    state
        .deals
        .get(&deal_id)
        .filter(|deal| deal.organization_id == organization_id)
        .ok_or_else(|| Error::NotFound("Deal not found".to_string()))
}

fn task_in_org(state: &CrmState, task_id: Uuid, organization_id: Uuid) -> Result<(&Task, &Deal)> {
    let task = state
        .tasks
        .get(&task_id)
        .ok_or_else(|| Error::NotFound("Task not found".to_string()))?;
    let deal = state
        .deals
        .get(&task.deal_id)
        .filter(|deal| deal.organization_id == organization_id)
        .ok_or_else(|| Error::NotFound("Task not found".to_string()))?;
    Ok((task, deal))
}

async fn load_state(path: &Path) -> Result<CrmState> {
    if !path.exists() {
        return Ok(CrmState::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| Error::Storage(format!("Failed to read CRM state: {}", err)))?;
    if content.trim().is_empty() {
        return Ok(CrmState::default());
    }
    let stored: StoredCrmState = serde_json::from_str(&content)
        .map_err(|err| Error::Storage(format!("Failed to parse CRM state: {}", err)))?;
    Ok(stored.into())
}

async fn persist_state(path: &Path, state: &CrmState) -> Result<()> {
    let content = serde_json::to_string_pretty(&StoredCrmState::from(state))
        .map_err(|err| Error::Storage(format!("Failed to serialize CRM state: {}", err)))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| Error::Storage(format!("Failed to create data dir: {}", err)))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|err| Error::Storage(format!("Failed to write CRM state: {}", err)))?;
    Ok(())
}
