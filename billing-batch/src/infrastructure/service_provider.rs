use std::sync::Arc;

use domain_billing::{
    repository::ClusterRegistry,
    service::{BillingCalculationService, PricingCache},
};
use service_billing::*;

use super::{
    config::BillingBatchConfig,
    repository::{JsonClusterRegistry, JsonStore},
    service::{
        ConfigClusterFilterPolicy, ConfigFeatureFlagService, JsonBillingExport,
        JsonUtilizationService,
    },
};

const CLUSTER_REGISTRY_FILES: [&str; 2] = ["k8s_clusters.json", "ecs_clusters.json"];

/// Everything one batch invocation needs, wired from configuration.
pub struct ServiceProvider {
    pub config: BillingBatchConfig,
    pub tasklet: InstanceBillingDataTasklet,
}

impl ServiceProvider {
    pub async fn build(config: config::Config) -> anyhow::Result<Self> {
        let config = config.try_deserialize::<BillingBatchConfig>()?;
        let save_dir = config.common.store().path().as_str();

        let store = Arc::new(JsonStore::new(save_dir).await?);
        let billing_export = Arc::new(JsonBillingExport::new(save_dir).await?);
        let mut cluster_registries: Vec<Arc<dyn ClusterRegistry>> = vec![];
        for file_name in CLUSTER_REGISTRY_FILES {
            cluster_registries.push(Arc::new(JsonClusterRegistry::new(save_dir, file_name).await?));
        }

        let pricing_cache: Arc<dyn PricingCache> = Arc::new(
            ProviderPricingCacheImpl::builder()
                .billing_export_service(billing_export.clone())
                .rate_card(config.pricing.rate_card.clone())
                .ttl(config.pricing.cache_ttl())
                .build(),
        );
        let calculation_service: Arc<dyn BillingCalculationService> = Arc::new(
            BillingCalculationServiceImpl::builder()
                .pricing_cache(pricing_cache.clone())
                .build(),
        );
        let parent_attribution_service = Arc::new(
            ParentAttributionServiceImpl::builder()
                .instance_data_repo(store.clone())
                .calculation_service(calculation_service.clone())
                .build(),
        );
        let billing_data_writer = BillingDataWriter::builder()
            .instance_billing_data_repo(store.clone())
            .build();

        let tasklet = InstanceBillingDataTasklet::builder()
            .instance_data_repo(store)
            .cluster_registries(cluster_registries)
            .cluster_filter_policy(Arc::new(ConfigClusterFilterPolicy::new(
                config.cluster_filter.clone(),
            )))
            .feature_flag_service(Arc::new(ConfigFeatureFlagService::new(
                config.feature_flags.clone(),
            )))
            .utilization_service(Arc::new(JsonUtilizationService::new(save_dir).await?))
            .pricing_cache(pricing_cache)
            .billing_export_metadata_service(billing_export)
            .calculation_service(calculation_service)
            .parent_attribution_service(parent_attribution_service)
            .billing_data_writer(billing_data_writer)
            .chunk_size(config.batch.chunk_size)
            .stale_running_repair_days(config.batch.stale_running_repair_days)
            .build();

        Ok(Self { config, tasklet })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Utc;
    use domain_billing::model::entity::InstanceBillingData;
    use indoc::formatdoc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::infrastructure::repository::load_collection;

    #[tokio::test]
    async fn configured_job_writes_billing_rows() {
        let dir = std::env::temp_dir().join(format!("billing-batch-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let instances = indoc::indoc! {r#"
            [
              {
                "account_id": "account",
                "instance_id": "node-1",
                "instance_name": "node-1",
                "instance_type": "K8S_NODE",
                "cluster_id": "prod",
                "usage_start_time": "2023-04-01T00:00:00Z",
                "total_resource": { "cpu_units": 2048.0, "memory_mb": 4096.0 }
              }
            ]
        "#};
        tokio::fs::write(dir.join("instances.json"), instances).await.unwrap();
        let yaml = formatdoc! {"
            store:
              path: {path}
            job:
              account_id: account
              start: 2023-05-01T00:00:00Z
              end: 2023-05-02T00:00:00Z
        ", path = dir.to_string_lossy()};
        let config = config::Config::builder()
            .add_source(config::File::from_str(&yaml, config::FileFormat::Yaml))
            .build()
            .unwrap();

        let provider = ServiceProvider::build(config).await.unwrap();
        let job = &provider.config.job;
        let summary = provider
            .tasklet
            .run(&job.account_id, job.window(Utc::now()).unwrap(), job.job_type)
            .await
            .unwrap();

        assert_eq!(summary.rows, 1);
        let rows: Vec<InstanceBillingData> =
            load_collection(Path::new(&dir), "instance_billing_data.json")
                .await
                .unwrap();
        assert_eq!(rows[0].instance_id, "node-1");
        assert_eq!(rows[0].billing_amount, Decimal::new(1536, 3));
    }
}
