use async_trait::async_trait;

/// Runs billing one cluster at a time instead of over the whole account.
pub const CLUSTER_SCOPED_BILLING: &str = "CLUSTER_SCOPED_BILLING";

#[async_trait]
pub trait FeatureFlagService: Send + Sync {
    async fn is_enabled(&self, flag: &str, account_id: &str) -> anyhow::Result<bool>;
}
