//! Deal analytics
//!
//! Summary and funnel aggregations over an organization's deals, memoized
//! in a bounded TTL cache. Cached values are never invalidated on writes;
//! callers may observe data up to the TTL old.

mod cache;
mod reporter;

pub use cache::{Clock, SystemClock, TtlCache};
pub use reporter::{cache_ttl, AnalyticsReporter, DealsSummary, FunnelStage};
