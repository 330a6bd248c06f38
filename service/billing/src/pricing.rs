use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use domain_billing::{
    model::vo::{
        BillingWindow, CloudProvider, PricingSource, RateCard, ResourceCost, UnitRate,
        VmListPrice,
    },
    service::{BillingExportService, PricingCache},
};
use rust_decimal::Decimal;
use tracing::debug;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CostKey {
    provider: CloudProvider,
    resource_id: String,
    window_start: DateTime<Utc>,
}

impl CostKey {
    fn new(provider: CloudProvider, resource_id: &str, window: &BillingWindow) -> Self {
        Self {
            provider,
            resource_id: resource_id.to_owned(),
            window_start: window.start,
        }
    }
}

/// Billing-export costs cached for one epoch, backed by a static rate card.
#[derive(TypedBuilder)]
pub struct ProviderPricingCacheImpl {
    billing_export_service: Arc<dyn BillingExportService>,
    #[builder(default)]
    rate_card: RateCard,
    #[builder(default = Duration::hours(1))]
    ttl: Duration,
    #[builder(default = Utc::now as fn() -> DateTime<Utc>)]
    clock: fn() -> DateTime<Utc>,
    #[builder(default, setter(skip))]
    epoch: Mutex<Option<DateTime<Utc>>>,
    #[builder(default, setter(skip))]
    costs: DashMap<CostKey, ResourceCost>,
}

impl ProviderPricingCacheImpl {
    pub fn epoch(&self) -> Option<DateTime<Utc>> {
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new epoch, dropping every cached cost, once the current one
    /// is older than the TTL.
    fn roll_epoch(&self, now: DateTime<Utc>) {
        let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = epoch.map_or(true, |started| now - started > self.ttl);
        if expired {
            if epoch.is_some() {
                debug!("Pricing cache epoch expired, dropping {} entries", self.costs.len());
            }
            self.costs.clear();
            *epoch = Some(now);
        }
    }
}

#[async_trait]
impl PricingCache for ProviderPricingCacheImpl {
    async fn warm(
        &self,
        provider: CloudProvider,
        resource_ids: &[String],
        window: &BillingWindow,
        dataset_id: Option<String>,
    ) -> anyhow::Result<()> {
        self.roll_epoch((self.clock)());
        let Some(dataset_id) = dataset_id else {
            return Ok(());
        };
        let mut missing = resource_ids
            .iter()
            .filter(|id| !self.costs.contains_key(&CostKey::new(provider, id, window)))
            .cloned()
            .collect::<Vec<_>>();
        missing.sort();
        missing.dedup();
        if missing.is_empty() {
            return Ok(());
        }
        let costs = self
            .billing_export_service
            .get_resource_costs(provider, &dataset_id, &missing, window)
            .await?;
        debug!(
            "Warmed {} of {} {provider} resource costs from dataset {dataset_id}",
            costs.len(),
            missing.len()
        );
        for cost in costs {
            self.costs
                .insert(CostKey::new(provider, &cost.resource_id, window), cost);
        }
        Ok(())
    }

    fn custom_cost(
        &self,
        provider: CloudProvider,
        resource_id: &str,
        window: &BillingWindow,
    ) -> Option<ResourceCost> {
        self.costs
            .get(&CostKey::new(provider, resource_id, window))
            .map(|cost| cost.value().clone())
    }

    fn vm_list_price(
        &self,
        provider: CloudProvider,
        family: &str,
        region: &str,
    ) -> Option<VmListPrice> {
        self.rate_card.vm_price(provider, family, region).cloned()
    }

    fn fargate_rate(&self, region: Option<&str>) -> (UnitRate, PricingSource) {
        match region.and_then(|region| self.rate_card.fargate_rates.get(region)) {
            Some(rate) => (*rate, PricingSource::List),
            None => (self.rate_card.default_fargate_rate, PricingSource::Hardcoded),
        }
    }

    fn default_unit_rate(&self) -> UnitRate {
        self.rate_card.default_unit_rate
    }

    fn storage_price(&self, storage_class: Option<&str>) -> (Decimal, PricingSource) {
        match storage_class.and_then(|class| self.rate_card.storage_prices.get(class)) {
            Some(price) => (*price, PricingSource::List),
            None => (self.rate_card.default_storage_price, PricingSource::Hardcoded),
        }
    }
}
