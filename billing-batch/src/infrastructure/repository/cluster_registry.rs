use std::path::Path;

use async_trait::async_trait;
use domain_billing::repository::ClusterRegistry;
use serde::{Deserialize, Serialize};

use super::load_collection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub account_id: String,
    pub cluster_id: String,
}

/// Clusters one orchestration platform has registered, read from a JSON file.
pub struct JsonClusterRegistry {
    clusters: Vec<ClusterRecord>,
}

impl JsonClusterRegistry {
    pub async fn new(save_dir: &str, file_name: &str) -> anyhow::Result<Self> {
        Ok(Self {
            clusters: load_collection(Path::new(save_dir), file_name).await?,
        })
    }
}

#[async_trait]
impl ClusterRegistry for JsonClusterRegistry {
    async fn get_cluster_ids(&self, account_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .clusters
            .iter()
            .filter(|x| x.account_id == account_id)
            .map(|x| x.cluster_id.clone())
            .collect())
    }
}
