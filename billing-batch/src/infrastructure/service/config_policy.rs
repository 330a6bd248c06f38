use async_trait::async_trait;
use domain_billing::{
    model::vo::BillingWindow,
    service::{ClusterFilterPolicy, FeatureFlagService, CLUSTER_SCOPED_BILLING},
};

use crate::infrastructure::config::{ClusterFilterConfig, FeatureFlagConfig};

pub struct ConfigFeatureFlagService {
    config: FeatureFlagConfig,
}

impl ConfigFeatureFlagService {
    pub fn new(config: FeatureFlagConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FeatureFlagService for ConfigFeatureFlagService {
    async fn is_enabled(&self, flag: &str, account_id: &str) -> anyhow::Result<bool> {
        Ok(match flag {
            CLUSTER_SCOPED_BILLING => {
                self.config.cluster_scoped_billing
                    || self
                        .config
                        .cluster_scoped_billing_accounts
                        .iter()
                        .any(|x| x == account_id)
            }
            _ => false,
        })
    }
}

pub struct ConfigClusterFilterPolicy {
    config: ClusterFilterConfig,
}

impl ConfigClusterFilterPolicy {
    pub fn new(config: ClusterFilterConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClusterFilterPolicy for ConfigClusterFilterPolicy {
    async fn should_bill(
        &self,
        _account_id: &str,
        cluster_id: &str,
        window: &BillingWindow,
    ) -> anyhow::Result<bool> {
        if self.config.excluded_cluster_ids.iter().any(|x| x == cluster_id) {
            return Ok(false);
        }
        Ok(self
            .config
            .billing_start
            .get(cluster_id)
            .map_or(true, |start| window.start >= *start))
    }
}
