//! Short-lived cache in front of the policy store, so one policy read
//! serves a burst of clock traffic for the same company.

use std::time::Duration;

use moka::future::Cache;
use once_cell::sync::Lazy;

use crate::error::TimeClockError;
use crate::model::policy::TimePolicy;
use crate::store::PolicyStore;

static POLICY_CACHE: Lazy<Cache<u64, TimePolicy>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(300))
        .build()
});

pub async fn resolve_policy(
    store: &dyn PolicyStore,
    company_id: u64,
) -> Result<TimePolicy, TimeClockError> {
    if let Some(policy) = POLICY_CACHE.get(&company_id).await {
        return Ok(policy);
    }
    let policy = store.policy_for(company_id).await?;
    POLICY_CACHE.insert(company_id, policy.clone()).await;
    Ok(policy)
}
