use async_trait::async_trait;

/// A registry of clusters billing may run for.
#[async_trait]
pub trait ClusterRegistry: Send + Sync {
    async fn get_cluster_ids(&self, account_id: &str) -> anyhow::Result<Vec<String>>;
}
