//! Aggregation reporter over deals

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::deal::DealStage;
use crate::store::CrmStore;
use crate::Result;

use super::cache::{Clock, SystemClock, TtlCache};

const CACHE_TTL_MINUTES: i64 = 5;
const CACHE_CAPACITY: usize = 1024;

/// Fixed cache window for both aggregations.
pub fn cache_ttl() -> Duration {
    Duration::minutes(CACHE_TTL_MINUTES)
}

/// Per-status counts and amounts for an organization's deals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealsSummary {
    pub total_count: u64,
    pub new_count: u64,
    pub in_progress_count: u64,
    pub won_count: u64,
    pub lost_count: u64,
    pub total_amount: Decimal,
    pub won_amount: Decimal,
    pub average_won_amount: Decimal,
}

/// One row of the funnel view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: DealStage,
    pub count: u64,
}

/// Computes summary/funnel statistics, memoized per organization for
/// `cache_ttl()`. Results are not invalidated on deal writes; that staleness
/// is the documented trade-off.
#[derive(Clone)]
pub struct AnalyticsReporter {
    store: CrmStore,
    summary_cache: Arc<Mutex<TtlCache<Uuid, DealsSummary>>>,
    funnel_cache: Arc<Mutex<TtlCache<Uuid, Vec<FunnelStage>>>>,
}

impl AnalyticsReporter {
    pub fn new(store: CrmStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: CrmStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            summary_cache: Arc::new(Mutex::new(TtlCache::new(
                cache_ttl(),
                CACHE_CAPACITY,
                Arc::clone(&clock),
            ))),
            funnel_cache: Arc::new(Mutex::new(TtlCache::new(cache_ttl(), CACHE_CAPACITY, clock))),
        }
    }

    pub async fn deals_summary(&self, organization_id: Uuid) -> Result<DealsSummary> {
        {
            let mut cache = self.summary_cache.lock().await;
            if let Some(summary) = cache.get(&organization_id) {
                return Ok(summary);
            }
        }

        let summary = self.store.deals_summary(organization_id).await?;
        self.summary_cache
            .lock()
            .await
            .insert(organization_id, summary.clone());
        Ok(summary)
    }

    pub async fn deals_funnel(&self, organization_id: Uuid) -> Result<Vec<FunnelStage>> {
        {
            let mut cache = self.funnel_cache.lock().await;
            if let Some(funnel) = cache.get(&organization_id) {
                return Ok(funnel);
            }
        }

        let funnel = self.store.deals_funnel(organization_id).await?;
        self.funnel_cache
            .lock()
            .await
            .insert(organization_id, funnel.clone());
        Ok(funnel)
    }
}
