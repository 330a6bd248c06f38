use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;

use crate::{
    model::{
        entity::{InstanceBillingData, InstanceData},
        vo::{BatchJobType, BillingWindow, CloudProvider, InstanceKey, ResourceCost, UtilizationData},
    },
    repository::{ClusterRegistry, InstanceBillingDataRepo, InstanceDataRepo, InstanceQuery},
    service::{
        BillingExportMetadataService, BillingExportService, ClusterFilterPolicy,
        FeatureFlagService, ParentAttributionService, UtilizationService,
    },
};

mock! {
    pub InstanceDataRepo {}
    #[async_trait]
    impl InstanceDataRepo for InstanceDataRepo {
        async fn get_active_instances(
            &self,
            query: &InstanceQuery,
            offset: usize,
            limit: usize,
        ) -> anyhow::Result<Vec<InstanceData>>;
        async fn get_by_ids(
            &self,
            account_id: &str,
            instance_ids: &[String],
        ) -> anyhow::Result<Vec<InstanceData>>;
        async fn get_by_name(
            &self,
            account_id: &str,
            cluster_id: Option<String>,
            instance_name: &str,
            as_of: DateTime<Utc>,
        ) -> anyhow::Result<Option<InstanceData>>;
        async fn mark_stopped(&self, instance: &InstanceData) -> anyhow::Result<()>;
        async fn initialize_active_iterator(&self, instance: &InstanceData) -> anyhow::Result<()>;
    }
}

mock! {
    pub InstanceBillingDataRepo {}
    #[async_trait]
    impl InstanceBillingDataRepo for InstanceBillingDataRepo {
        async fn create(
            &self,
            rows: &[InstanceBillingData],
            job_type: BatchJobType,
        ) -> anyhow::Result<()>;
    }
}

mock! {
    pub ClusterRegistry {}
    #[async_trait]
    impl ClusterRegistry for ClusterRegistry {
        async fn get_cluster_ids(&self, account_id: &str) -> anyhow::Result<Vec<String>>;
    }
}

mock! {
    pub UtilizationService {}
    #[async_trait]
    impl UtilizationService for UtilizationService {
        async fn get_utilization(
            &self,
            instances: &[InstanceData],
            window: &BillingWindow,
            account_id: &str,
            setting_id: Option<String>,
            cluster_id: Option<String>,
        ) -> anyhow::Result<HashMap<String, UtilizationData>>;
    }
}

mock! {
    pub BillingExportService {}
    #[async_trait]
    impl BillingExportService for BillingExportService {
        async fn get_resource_costs(
            &self,
            provider: CloudProvider,
            dataset_id: &str,
            resource_ids: &[String],
            window: &BillingWindow,
        ) -> anyhow::Result<Vec<ResourceCost>>;
    }
}

mock! {
    pub BillingExportMetadataService {}
    #[async_trait]
    impl BillingExportMetadataService for BillingExportMetadataService {
        async fn get_dataset_id(
            &self,
            account_id: &str,
            provider: CloudProvider,
        ) -> anyhow::Result<Option<String>>;
    }
}

mock! {
    pub ClusterFilterPolicy {}
    #[async_trait]
    impl ClusterFilterPolicy for ClusterFilterPolicy {
        async fn should_bill(
            &self,
            account_id: &str,
            cluster_id: &str,
            window: &BillingWindow,
        ) -> anyhow::Result<bool>;
    }
}

mock! {
    pub FeatureFlagService {}
    #[async_trait]
    impl FeatureFlagService for FeatureFlagService {
        async fn is_enabled(&self, flag: &str, account_id: &str) -> anyhow::Result<bool>;
    }
}

mock! {
    pub ParentAttributionService {}
    #[async_trait]
    impl ParentAttributionService for ParentAttributionService {
        async fn resolve_parent_id(&self, instance: &InstanceData) -> anyhow::Result<Option<String>>;
        fn active_seconds(
            &self,
            parents: &[InstanceData],
            window: &BillingWindow,
        ) -> HashMap<InstanceKey, f64>;
    }
}
