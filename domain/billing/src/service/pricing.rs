use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::model::vo::{
    BillingWindow, CloudProvider, PricingSource, ResourceCost, UnitRate, VmListPrice,
};

/// Prices for one invocation, warmed per chunk and read synchronously.
#[async_trait]
pub trait PricingCache: Send + Sync {
    /// Loads billing-export costs of `resource_ids` for the window. Does
    /// nothing without a dataset.
    async fn warm(
        &self,
        provider: CloudProvider,
        resource_ids: &[String],
        window: &BillingWindow,
        dataset_id: Option<String>,
    ) -> anyhow::Result<()>;

    fn custom_cost(
        &self,
        provider: CloudProvider,
        resource_id: &str,
        window: &BillingWindow,
    ) -> Option<ResourceCost>;

    fn vm_list_price(
        &self,
        provider: CloudProvider,
        family: &str,
        region: &str,
    ) -> Option<VmListPrice>;

    /// Fargate vCPU-hour and GB-hour rates for a region.
    fn fargate_rate(&self, region: Option<&str>) -> (UnitRate, PricingSource);

    /// Rates used when nothing better is known.
    fn default_unit_rate(&self) -> UnitRate;

    /// Per GB-month price of a storage class.
    fn storage_price(&self, storage_class: Option<&str>) -> (Decimal, PricingSource);
}

/// Reads per-resource costs out of a provider's billing export.
#[async_trait]
pub trait BillingExportService: Send + Sync {
    async fn get_resource_costs(
        &self,
        provider: CloudProvider,
        dataset_id: &str,
        resource_ids: &[String],
        window: &BillingWindow,
    ) -> anyhow::Result<Vec<ResourceCost>>;
}

/// Where an account's billing export lives.
#[async_trait]
pub trait BillingExportMetadataService: Send + Sync {
    async fn get_dataset_id(
        &self,
        account_id: &str,
        provider: CloudProvider,
    ) -> anyhow::Result<Option<String>>;
}
