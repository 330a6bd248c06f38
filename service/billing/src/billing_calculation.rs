use std::collections::HashMap;
use std::sync::Arc;

use domain_billing::{
    exception::{BillingException, BillingResult},
    model::{
        entity::InstanceData,
        vo::{
            seconds_between, to_money, BillingAmountBreakup, BillingData, BillingWindow,
            CostComposition, IdleCostData, InstanceCategory, InstanceKey, PricingData,
            PricingSource, Resource, SystemCostData, UtilizationData,
        },
    },
    service::{BillingCalculationService, PricingCache},
};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

const SECONDS_PER_HOUR: f64 = 3600.0;
/// Hours in the month storage prices are quoted for.
const HOURS_PER_MONTH: f64 = 720.0;

#[derive(TypedBuilder)]
pub struct BillingCalculationServiceImpl {
    pricing_cache: Arc<dyn PricingCache>,
}

impl BillingCalculationServiceImpl {
    fn resolve_pricing(
        &self,
        instance: &InstanceData,
        composition: CostComposition,
        basis_seconds: f64,
        window: &BillingWindow,
    ) -> PricingData {
        match composition {
            CostComposition::ComputeHost => {
                self.machine_pricing(instance, instance.total_resource, true, basis_seconds, window)
            }
            CostComposition::HostedWorkload => {
                let meta = &instance.meta_data;
                let host = Resource::new(
                    meta.parent_resource_cpu.unwrap_or_default(),
                    meta.parent_resource_memory.unwrap_or_default(),
                );
                self.machine_pricing(instance, host, false, basis_seconds, window)
            }
            CostComposition::UnitPriced => self
                .custom_pricing(instance, instance.total_resource, basis_seconds, window)
                .unwrap_or_else(|| {
                    let (rate, pricing_source) =
                        self.pricing_cache.fargate_rate(instance.meta_data.region.as_deref());
                    PricingData {
                        cpu_price_per_hour: rate.cpu_price_per_hour,
                        memory_price_per_hour: rate.memory_price_per_hour,
                        cpu_units: instance.total_resource.cpu_units,
                        memory_mb: instance.total_resource.memory_mb,
                        pricing_source,
                        ..Default::default()
                    }
                }),
            CostComposition::Storage => self
                .custom_pricing(instance, Resource::default(), basis_seconds, window)
                .unwrap_or_else(|| {
                    let capacity_gb = instance.storage_resource.unwrap_or_default().capacity_gb();
                    let (price_per_gb_month, pricing_source) = self
                        .pricing_cache
                        .storage_price(instance.meta_data.storage_class.as_deref());
                    PricingData {
                        price_per_hour: price_per_gb_month * to_money(capacity_gb / HOURS_PER_MONTH),
                        pricing_source,
                        ..Default::default()
                    }
                }),
            CostComposition::Claim => PricingData::default(),
        }
    }

    /// Price of the machine an instance is, or runs on, described by `capacity`.
    fn machine_pricing(
        &self,
        instance: &InstanceData,
        capacity: Resource,
        owns_network: bool,
        basis_seconds: f64,
        window: &BillingWindow,
    ) -> PricingData {
        if let Some(mut pricing) = self.custom_pricing(instance, capacity, basis_seconds, window) {
            if !owns_network {
                pricing.network_cost = Decimal::ZERO;
            }
            return pricing;
        }
        let meta = &instance.meta_data;
        let list_price = meta
            .instance_family
            .as_deref()
            .zip(meta.region.as_deref())
            .and_then(|(family, region)| {
                self.pricing_cache
                    .vm_list_price(meta.cloud_provider, family, region)
            });
        if let Some(list_price) = list_price {
            let price_per_hour = match (meta.instance_category, list_price.spot_price) {
                (InstanceCategory::Spot, Some(spot_price)) => spot_price,
                _ => list_price.on_demand_price,
            };
            let capacity = if capacity.is_empty() {
                Resource::new(list_price.cpus * 1024.0, list_price.memory_gb * 1024.0)
            } else {
                capacity
            };
            return PricingData {
                price_per_hour,
                cpu_units: capacity.cpu_units,
                memory_mb: capacity.memory_mb,
                pricing_source: PricingSource::List,
                ..Default::default()
            };
        }
        debug!(
            "No list price for instance {}, using default unit rates",
            instance.instance_id
        );
        let rate = self.pricing_cache.default_unit_rate();
        PricingData {
            cpu_price_per_hour: rate.cpu_price_per_hour,
            memory_price_per_hour: rate.memory_price_per_hour,
            cpu_units: capacity.cpu_units,
            memory_mb: capacity.memory_mb,
            pricing_source: PricingSource::Hardcoded,
            ..Default::default()
        }
    }

    /// Hourly price derived from a window-total billing export cost.
    fn custom_pricing(
        &self,
        instance: &InstanceData,
        capacity: Resource,
        basis_seconds: f64,
        window: &BillingWindow,
    ) -> Option<PricingData> {
        if basis_seconds <= 0.0 {
            return None;
        }
        let resource_id = instance.pricing_resource_id()?;
        let cost = self.pricing_cache.custom_cost(
            instance.meta_data.cloud_provider,
            resource_id,
            window,
        )?;
        let basis_hours = to_money(basis_seconds / SECONDS_PER_HOUR);
        Some(PricingData {
            price_per_hour: cost.compute_cost / basis_hours,
            cpu_units: capacity.cpu_units,
            memory_mb: capacity.memory_mb,
            network_cost: cost.network_cost,
            pricing_source: PricingSource::Custom,
            ..Default::default()
        })
    }

    /// Resource shape billed for an instance. Workloads without requests are
    /// billed for what they actually used.
    fn billed_resource(
        instance: &InstanceData,
        composition: CostComposition,
        utilization: Option<&UtilizationData>,
    ) -> Resource {
        let requested = instance.total_resource;
        match (composition, utilization) {
            (CostComposition::HostedWorkload | CostComposition::UnitPriced, Some(utilization))
                if requested.is_empty() =>
            {
                Resource::new(
                    utilization.avg_cpu_utilization_value,
                    utilization.avg_memory_utilization_value,
                )
            }
            _ => requested,
        }
    }

    fn billing_amount_breakup(
        composition: CostComposition,
        resource: Resource,
        pricing: &PricingData,
        active_seconds: f64,
    ) -> BillingAmountBreakup {
        let hours = to_money(active_seconds / SECONDS_PER_HOUR);
        let (cpu_billing_amount, memory_billing_amount, storage_billing_amount) = match composition
        {
            CostComposition::Claim => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            CostComposition::Storage => (Decimal::ZERO, Decimal::ZERO, pricing.price_per_hour * hours),
            _ if pricing.is_unit_priced() => (
                to_money(resource.vcpus()) * pricing.cpu_price_per_hour * hours,
                to_money(resource.memory_gb()) * pricing.memory_price_per_hour * hours,
                Decimal::ZERO,
            ),
            CostComposition::HostedWorkload => {
                let half = pricing.price_per_hour * hours / Decimal::TWO;
                (
                    half * share(resource.cpu_units, pricing.cpu_units),
                    half * share(resource.memory_mb, pricing.memory_mb),
                    Decimal::ZERO,
                )
            }
            _ => {
                let half = pricing.price_per_hour * hours / Decimal::TWO;
                (half, half, Decimal::ZERO)
            }
        };
        BillingAmountBreakup {
            billing_amount: cpu_billing_amount + memory_billing_amount + storage_billing_amount,
            cpu_billing_amount,
            memory_billing_amount,
            storage_billing_amount,
        }
    }

    fn compute_idle_cost(
        breakup: &BillingAmountBreakup,
        utilization: Option<&UtilizationData>,
    ) -> IdleCostData {
        let Some(utilization) = utilization else {
            return IdleCostData::default();
        };
        let cpu_idle_cost = idle_of(breakup.cpu_billing_amount, utilization.avg_cpu_utilization);
        let memory_idle_cost =
            idle_of(breakup.memory_billing_amount, utilization.avg_memory_utilization);
        IdleCostData {
            idle_cost: cpu_idle_cost + memory_idle_cost,
            cpu_idle_cost,
            memory_idle_cost,
            storage_idle_cost: Decimal::ZERO,
        }
    }

    /// Idle and unallocated storage cost of a persistent volume.
    fn storage_idle_and_unallocated(
        instance: &InstanceData,
        storage_billing_amount: Decimal,
        utilization: Option<&UtilizationData>,
    ) -> (IdleCostData, Decimal) {
        let Some(utilization) = utilization else {
            return (IdleCostData::default(), Decimal::ZERO);
        };
        let capacity = storage_capacity(instance, Some(utilization));
        let avg_request = utilization.avg_storage_request_value;
        let mut unallocated_fraction = if capacity > 0.0 && avg_request > 0.0 {
            (capacity - avg_request) / capacity
        } else {
            0.0
        };
        if unallocated_fraction < 0.0 {
            warn!(
                "Volume {} requests {avg_request} MB over its {capacity} MB capacity",
                instance.instance_id
            );
            unallocated_fraction = 0.0;
        }
        let unallocated = storage_billing_amount * to_money(unallocated_fraction);
        let idle_fraction = if capacity > 0.0 {
            ((utilization.max_storage_request_value - utilization.max_storage_usage_value)
                / capacity)
                .max(0.0)
        } else {
            0.0
        };
        let storage_idle_cost = (storage_billing_amount * to_money(idle_fraction))
            .min(storage_billing_amount - unallocated)
            .max(Decimal::ZERO);
        (
            IdleCostData {
                idle_cost: storage_idle_cost,
                storage_idle_cost,
                ..Default::default()
            },
            unallocated,
        )
    }

    /// Cost of capacity a machine reserves for itself.
    fn compute_system_cost(instance: &InstanceData, breakup: &BillingAmountBreakup) -> SystemCostData {
        let Some(allocatable) = instance.allocatable_resource else {
            return SystemCostData::default();
        };
        let total = instance.total_resource;
        let cpu_system_cost =
            breakup.cpu_billing_amount * reserved_fraction(total.cpu_units, allocatable.cpu_units);
        let memory_system_cost = breakup.memory_billing_amount
            * reserved_fraction(total.memory_mb, allocatable.memory_mb);
        SystemCostData {
            system_cost: cpu_system_cost + memory_system_cost,
            cpu_system_cost,
            memory_system_cost,
        }
    }
}

impl BillingCalculationService for BillingCalculationServiceImpl {
    fn compute(
        &self,
        instance: &InstanceData,
        utilization: Option<&UtilizationData>,
        parent_active_seconds: Option<f64>,
        window: &BillingWindow,
    ) -> BillingResult<BillingData> {
        let instance_type =
            instance
                .instance_type
                .ok_or_else(|| BillingException::MissingInstanceType {
                    instance_id: instance.instance_id.clone(),
                })?;
        let composition = instance_type.cost_composition();

        let active_seconds = match (instance.usage_start_time, parent_active_seconds) {
            (None, Some(parent_active_seconds)) => parent_active_seconds,
            _ => self.active_seconds(instance, window),
        };
        let basis_seconds = parent_active_seconds.unwrap_or(active_seconds);
        let pricing = self.resolve_pricing(instance, composition, basis_seconds, window);
        let resource = Self::billed_resource(instance, composition, utilization);
        let breakup = Self::billing_amount_breakup(composition, resource, &pricing, active_seconds);

        let (idle_cost_data, storage_unallocated_cost) = match composition {
            CostComposition::Storage => Self::storage_idle_and_unallocated(
                instance,
                breakup.storage_billing_amount,
                utilization,
            ),
            CostComposition::Claim => (IdleCostData::default(), Decimal::ZERO),
            _ => (Self::compute_idle_cost(&breakup, utilization), Decimal::ZERO),
        };
        let system_cost_data = match composition {
            CostComposition::ComputeHost => Self::compute_system_cost(instance, &breakup),
            _ => SystemCostData::default(),
        };
        let storage_mb_seconds = match composition {
            CostComposition::Storage => storage_capacity(instance, utilization) * active_seconds,
            _ => 0.0,
        };

        Ok(BillingData {
            billing_amount_breakup: breakup,
            idle_cost_data,
            system_cost_data,
            storage_unallocated_cost,
            network_cost: pricing.network_cost,
            usage_duration_seconds: active_seconds,
            cpu_unit_seconds: resource.cpu_units * active_seconds,
            memory_mb_seconds: resource.memory_mb * active_seconds,
            storage_mb_seconds,
            pricing_source: pricing.pricing_source,
        })
    }

    fn active_seconds(&self, instance: &InstanceData, window: &BillingWindow) -> f64 {
        let Some(start) = instance.usage_start_time else {
            return 0.0;
        };
        let stop = instance.usage_stop_time;
        let seconds = window.overlap_seconds(start, stop.unwrap_or(window.end));
        if seconds <= 0.0 {
            return 0.0;
        }
        let min_chargeable = instance
            .instance_type
            .map_or(0.0, |instance_type| instance_type.min_chargeable_seconds());
        match stop {
            Some(stop) if seconds_between(start, stop) < min_chargeable => {
                let before_window = seconds_between(start, window.start).max(0.0);
                let remaining = seconds_between(start.max(window.start), window.end);
                (min_chargeable - before_window).max(seconds).min(remaining)
            }
            _ => seconds,
        }
    }

    fn active_seconds_by_instance(
        &self,
        instances: &[InstanceData],
        window: &BillingWindow,
    ) -> HashMap<InstanceKey, f64> {
        instances
            .iter()
            .map(|instance| (instance.key(), self.active_seconds(instance, window)))
            .collect()
    }
}

/// `part / whole` as money, zero for an empty whole.
fn share(part: f64, whole: f64) -> Decimal {
    if whole <= 0.0 {
        return Decimal::ZERO;
    }
    to_money(part / whole)
}

fn idle_of(amount: Decimal, utilization: f64) -> Decimal {
    amount * to_money(1.0 - utilization.clamp(0.0, 1.0))
}

fn reserved_fraction(total: f64, allocatable: f64) -> Decimal {
    if total <= 0.0 || allocatable >= total {
        return Decimal::ZERO;
    }
    to_money((total - allocatable) / total)
}

fn storage_capacity(instance: &InstanceData, utilization: Option<&UtilizationData>) -> f64 {
    let capacity = instance.storage_resource.unwrap_or_default().capacity_mb;
    if capacity > 0.0 {
        return capacity;
    }
    utilization.map_or(0.0, |utilization| utilization.avg_storage_capacity_value)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use domain_billing::{
        mock::MockBillingExportService,
        model::vo::{
            CloudProvider, InstanceType, RateCard, ResourceCost, StorageResource, UnitRate,
            VmListPrice,
        },
    };

    use super::*;
    use crate::ProviderPricingCacheImpl;

    fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap()
    }

    fn day() -> BillingWindow {
        BillingWindow::new(day_start(), day_start() + Duration::days(1))
    }

    fn dec(value: f64) -> Decimal {
        to_money(value)
    }

    fn assert_close(actual: Decimal, expected: f64) {
        let diff = (actual - dec(expected)).abs();
        assert!(diff < dec(1e-9), "expected {expected}, got {actual}");
    }

    fn instance(instance_type: InstanceType, resource: Resource) -> InstanceData {
        InstanceData {
            account_id: "account".to_string(),
            instance_id: "instance".to_string(),
            instance_name: "instance".to_string(),
            instance_type: Some(instance_type),
            cluster_id: Some("cluster".to_string()),
            usage_start_time: Some(day_start()),
            usage_stop_time: Some(day_start() + Duration::hours(12)),
            total_resource: resource,
            ..Default::default()
        }
    }

    fn rate_card() -> RateCard {
        RateCard {
            vm_prices: vec![VmListPrice {
                provider: CloudProvider::Aws,
                family: "m5.xlarge".to_string(),
                region: "us-east-1".to_string(),
                on_demand_price: dec(1.6),
                spot_price: Some(dec(0.4)),
                cpus: 4.0,
                memory_gb: 16.0,
            }],
            ..Default::default()
        }
    }

    fn service_with(rate_card: RateCard) -> BillingCalculationServiceImpl {
        let cache = ProviderPricingCacheImpl::builder()
            .billing_export_service(Arc::new(MockBillingExportService::new()))
            .rate_card(rate_card)
            .build();
        BillingCalculationServiceImpl::builder()
            .pricing_cache(Arc::new(cache))
            .build()
    }

    async fn service_with_custom_cost(resource_id: &str, cost: f64) -> BillingCalculationServiceImpl {
        let resource_id = resource_id.to_string();
        let mut export = MockBillingExportService::new();
        export.expect_get_resource_costs().returning(move |_, _, _, _| {
            Ok(vec![ResourceCost {
                resource_id: resource_id.clone(),
                compute_cost: to_money(cost),
                network_cost: Decimal::ONE,
            }])
        });
        let cache = ProviderPricingCacheImpl::builder()
            .billing_export_service(Arc::new(export))
            .rate_card(rate_card())
            .build();
        cache
            .warm(
                CloudProvider::Aws,
                &["i-host".to_string()],
                &day(),
                Some("dataset".to_string()),
            )
            .await
            .unwrap();
        BillingCalculationServiceImpl::builder()
            .pricing_cache(Arc::new(cache))
            .build()
    }

    fn listed_node() -> InstanceData {
        let mut node = instance(InstanceType::K8sNode, Resource::new(4096.0, 4096.0));
        node.meta_data.cloud_provider = CloudProvider::Aws;
        node.meta_data.instance_family = Some("m5.xlarge".to_string());
        node.meta_data.region = Some("us-east-1".to_string());
        node
    }

    #[test]
    fn node_with_list_price_splits_cost_evenly() {
        let mut node = listed_node();
        node.allocatable_resource = Some(Resource::new(4096.0, 4096.0 - 108.0));
        let utilization = UtilizationData {
            avg_cpu_utilization: 0.5,
            avg_memory_utilization: 0.5,
            ..Default::default()
        };

        let billing = service_with(rate_card())
            .compute(&node, Some(&utilization), None, &day())
            .unwrap();

        let breakup = &billing.billing_amount_breakup;
        assert_close(breakup.billing_amount, 19.2);
        assert_close(breakup.cpu_billing_amount, 9.6);
        assert_close(breakup.memory_billing_amount, 9.6);
        assert_close(billing.idle_cost_data.cpu_idle_cost, 4.8);
        assert_close(billing.idle_cost_data.idle_cost, 9.6);
        assert_close(billing.system_cost_data.cpu_system_cost, 0.0);
        assert_close(billing.system_cost_data.memory_system_cost, 0.253125);
        assert_eq!(billing.pricing_source, PricingSource::List);
        assert_eq!(billing.usage_duration_seconds, 43200.0);
        assert_eq!(billing.cpu_unit_seconds, 4096.0 * 43200.0);
    }

    #[test]
    fn spot_node_uses_spot_price() {
        let mut node = listed_node();
        node.meta_data.instance_category = InstanceCategory::Spot;

        let billing = service_with(rate_card()).compute(&node, None, None, &day()).unwrap();

        assert_close(billing.billing_amount_breakup.billing_amount, 4.8);
        assert_eq!(billing.idle_cost_data, IdleCostData::default());
    }

    #[test]
    fn unpriced_node_falls_back_to_default_unit_rates() {
        let rate_card = RateCard {
            default_unit_rate: UnitRate {
                cpu_price_per_hour: dec(0.2),
                memory_price_per_hour: dec(0.05),
            },
            ..Default::default()
        };
        let node = instance(InstanceType::K8sNode, Resource::new(4096.0, 16384.0));

        let billing = service_with(rate_card).compute(&node, None, None, &day()).unwrap();

        assert_close(billing.billing_amount_breakup.cpu_billing_amount, 9.6);
        assert_close(billing.billing_amount_breakup.memory_billing_amount, 9.6);
        assert_eq!(billing.pricing_source, PricingSource::Hardcoded);
    }

    #[test]
    fn pod_gets_resource_share_of_host_price() {
        let mut pod = listed_node();
        pod.instance_type = Some(InstanceType::K8sPod);
        pod.total_resource = Resource::new(256.0, 512.0);
        pod.usage_stop_time = Some(day_start() + Duration::hours(10));
        pod.meta_data.parent_resource_cpu = Some(1024.0);
        pod.meta_data.parent_resource_memory = Some(1024.0);
        let mut rate_card = rate_card();
        rate_card.vm_prices[0].on_demand_price = dec(20.0);

        let billing = service_with(rate_card).compute(&pod, None, None, &day()).unwrap();

        let breakup = &billing.billing_amount_breakup;
        assert_close(breakup.cpu_billing_amount, 25.0);
        assert_close(breakup.memory_billing_amount, 50.0);
        assert_close(breakup.billing_amount, 75.0);
        assert_eq!(billing.system_cost_data, SystemCostData::default());
    }

    #[test]
    fn pod_on_host_without_resources_costs_nothing() {
        let mut pod = listed_node();
        pod.instance_type = Some(InstanceType::K8sPod);
        pod.total_resource = Resource::new(256.0, 512.0);
        pod.meta_data.parent_resource_cpu = Some(0.0);
        pod.meta_data.parent_resource_memory = Some(0.0);
        let mut rate_card = rate_card();
        rate_card.vm_prices[0].on_demand_price = dec(20.0);
        rate_card.vm_prices[0].cpus = 0.0;
        rate_card.vm_prices[0].memory_gb = 0.0;

        let billing = service_with(rate_card).compute(&pod, None, None, &day()).unwrap();

        assert_eq!(billing.billing_amount_breakup.billing_amount, Decimal::ZERO);
    }

    #[test]
    fn pod_with_unit_rates_bills_its_requests() {
        let rate_card = RateCard {
            default_unit_rate: UnitRate {
                cpu_price_per_hour: dec(0.05),
                memory_price_per_hour: Decimal::ZERO,
            },
            ..Default::default()
        };
        let mut pod = instance(InstanceType::K8sPod, Resource::new(2048.0, 0.0));
        pod.usage_stop_time = Some(day_start() + Duration::hours(1));
        let utilization = UtilizationData {
            avg_cpu_utilization: 0.25,
            avg_cpu_utilization_value: 512.0,
            ..Default::default()
        };

        let billing = service_with(rate_card)
            .compute(&pod, Some(&utilization), None, &day())
            .unwrap();

        assert_close(billing.billing_amount_breakup.billing_amount, 0.10);
        assert_close(billing.idle_cost_data.idle_cost, 0.075);
        assert_eq!(billing.usage_duration_seconds, 3600.0);
    }

    #[test]
    fn pod_without_requests_is_billed_for_usage() {
        let rate_card = RateCard {
            default_unit_rate: UnitRate {
                cpu_price_per_hour: dec(0.1),
                memory_price_per_hour: dec(0.1),
            },
            ..Default::default()
        };
        let mut pod = instance(InstanceType::K8sPod, Resource::default());
        pod.usage_stop_time = Some(day_start() + Duration::hours(1));
        let utilization = UtilizationData {
            avg_cpu_utilization: 1.5,
            avg_memory_utilization: 1.5,
            avg_cpu_utilization_value: 1024.0,
            avg_memory_utilization_value: 2048.0,
            ..Default::default()
        };

        let billing = service_with(rate_card)
            .compute(&pod, Some(&utilization), None, &day())
            .unwrap();

        assert_close(billing.billing_amount_breakup.cpu_billing_amount, 0.1);
        assert_close(billing.billing_amount_breakup.memory_billing_amount, 0.2);
        assert_eq!(billing.idle_cost_data.idle_cost, Decimal::ZERO);
    }

    #[tokio::test]
    async fn custom_cost_is_spread_over_host_active_time() {
        let service = service_with_custom_cost("i-host", 40.0).await;
        let mut pod = listed_node();
        pod.instance_type = Some(InstanceType::K8sPod);
        pod.meta_data.cloud_provider_instance_id = Some("i-host".to_string());
        pod.meta_data.parent_resource_cpu = Some(4096.0);
        pod.meta_data.parent_resource_memory = Some(4096.0);

        let over_day = service.compute(&pod, None, Some(86400.0), &day()).unwrap();
        assert_close(over_day.billing_amount_breakup.billing_amount, 20.0);
        assert_eq!(over_day.pricing_source, PricingSource::Custom);
        assert_eq!(over_day.network_cost, Decimal::ZERO);

        let over_16_hours = service.compute(&pod, None, Some(57600.0), &day()).unwrap();
        assert_close(over_16_hours.billing_amount_breakup.billing_amount, 30.0);
    }

    #[tokio::test]
    async fn custom_cost_of_node_covers_its_own_activity() {
        let service = service_with_custom_cost("i-host", 40.0).await;
        let mut node = listed_node();
        node.meta_data.cloud_provider_instance_id = Some("i-host".to_string());

        let billing = service.compute(&node, None, None, &day()).unwrap();

        assert_close(billing.billing_amount_breakup.billing_amount, 40.0);
        assert_eq!(billing.network_cost, Decimal::ONE);
    }

    #[test]
    fn fargate_task_uses_fargate_rates() {
        let mut rate_card = RateCard::default();
        rate_card.fargate_rates.insert(
            "us-east-1".to_string(),
            UnitRate {
                cpu_price_per_hour: dec(0.04),
                memory_price_per_hour: dec(0.004),
            },
        );
        let mut task = instance(InstanceType::EcsTaskFargate, Resource::new(1024.0, 2048.0));
        task.meta_data.region = Some("us-east-1".to_string());

        let billing = service_with(rate_card).compute(&task, None, None, &day()).unwrap();

        assert_close(billing.billing_amount_breakup.cpu_billing_amount, 0.48);
        assert_close(billing.billing_amount_breakup.memory_billing_amount, 0.096);
        assert_eq!(billing.pricing_source, PricingSource::List);
    }

    fn volume(capacity_mb: f64) -> InstanceData {
        let mut pv = instance(InstanceType::K8sPv, Resource::default());
        pv.usage_start_time = Some(day_start());
        pv.usage_stop_time = None;
        pv.storage_resource = Some(StorageResource { capacity_mb });
        pv
    }

    fn month() -> BillingWindow {
        BillingWindow::new(day_start(), day_start() + Duration::days(30))
    }

    #[test]
    fn volume_splits_cost_into_unallocated_and_idle() {
        let mut rate_card = RateCard::default();
        rate_card
            .storage_prices
            .insert("gp3".to_string(), dec(0.1));
        let mut pv = volume(100.0 * 1024.0);
        pv.meta_data.storage_class = Some("gp3".to_string());
        let utilization = UtilizationData {
            avg_storage_request_value: 40.0 * 1024.0,
            max_storage_request_value: 40.0 * 1024.0,
            max_storage_usage_value: 20.0 * 1024.0,
            ..Default::default()
        };

        let billing = service_with(rate_card)
            .compute(&pv, Some(&utilization), None, &month())
            .unwrap();

        assert_close(billing.billing_amount_breakup.storage_billing_amount, 10.0);
        assert_close(billing.billing_amount_breakup.billing_amount, 10.0);
        assert_close(billing.storage_unallocated_cost, 6.0);
        assert_close(billing.idle_cost_data.storage_idle_cost, 2.0);
        assert_eq!(billing.pricing_source, PricingSource::List);
        assert_eq!(billing.storage_mb_seconds, 100.0 * 1024.0 * 30.0 * 86400.0);
    }

    #[test]
    fn volume_idle_never_exceeds_allocated_cost() {
        let mut pv = volume(100.0);
        let utilization = UtilizationData {
            avg_storage_request_value: 10.0,
            max_storage_request_value: 100.0,
            max_storage_usage_value: 0.0,
            ..Default::default()
        };

        let billing = service_with(RateCard::default())
            .compute(&pv, Some(&utilization), None, &month())
            .unwrap();
        let storage = billing.billing_amount_breakup.storage_billing_amount;
        assert!(billing.idle_cost_data.storage_idle_cost + billing.storage_unallocated_cost <= storage);

        pv.storage_resource = Some(StorageResource { capacity_mb: 0.0 });
        let empty = service_with(RateCard::default())
            .compute(&pv, Some(&utilization), None, &month())
            .unwrap();
        assert_eq!(empty.idle_cost_data.storage_idle_cost, Decimal::ZERO);
        assert_eq!(empty.storage_unallocated_cost, Decimal::ZERO);
    }

    #[test]
    fn request_over_capacity_leaves_nothing_unallocated() {
        let pv = volume(100.0);
        let utilization = UtilizationData {
            avg_storage_request_value: 150.0,
            max_storage_request_value: 150.0,
            max_storage_usage_value: 50.0,
            ..Default::default()
        };

        let billing = service_with(RateCard::default())
            .compute(&pv, Some(&utilization), None, &month())
            .unwrap();
        let storage = billing.billing_amount_breakup.storage_billing_amount;

        assert_eq!(billing.storage_unallocated_cost, Decimal::ZERO);
        assert!(billing.idle_cost_data.storage_idle_cost >= Decimal::ZERO);
        assert!(billing.idle_cost_data.storage_idle_cost <= storage);
    }

    #[test]
    fn volume_without_utilization_uses_default_price() {
        let pv = volume(1024.0);

        let billing = service_with(RateCard::default())
            .compute(&pv, None, None, &month())
            .unwrap();

        assert_close(billing.billing_amount_breakup.storage_billing_amount, 0.04);
        assert_eq!(billing.idle_cost_data.idle_cost, Decimal::ZERO);
        assert_eq!(billing.storage_unallocated_cost, Decimal::ZERO);
        assert_eq!(billing.pricing_source, PricingSource::Hardcoded);
    }

    #[test]
    fn claim_rows_carry_no_cost() {
        let pvc = instance(InstanceType::K8sPvc, Resource::default());

        let billing = service_with(rate_card()).compute(&pvc, None, None, &day()).unwrap();

        assert_eq!(billing.billing_amount_breakup, BillingAmountBreakup::default());
        assert_eq!(billing.usage_duration_seconds, 43200.0);
    }

    #[test]
    fn untyped_instance_is_rejected() {
        let mut untyped = listed_node();
        untyped.instance_type = None;

        let result = service_with(rate_card()).compute(&untyped, None, None, &day());

        assert!(matches!(
            result,
            Err(BillingException::MissingInstanceType { .. })
        ));
    }

    #[test]
    fn missing_start_time_borrows_parent_activity() {
        let mut pod = listed_node();
        pod.instance_type = Some(InstanceType::K8sPod);
        pod.usage_start_time = None;

        let service = service_with(rate_card());
        assert_eq!(service.active_seconds(&pod, &day()), 0.0);
        let billing = service.compute(&pod, None, Some(7200.0), &day()).unwrap();
        assert_eq!(billing.usage_duration_seconds, 7200.0);
    }

    fn stopped(instance_type: InstanceType, start: i64, stop: i64) -> InstanceData {
        let mut instance = instance(instance_type, Resource::default());
        instance.usage_start_time = Some(day_start() + Duration::seconds(start));
        instance.usage_stop_time = Some(day_start() + Duration::seconds(stop));
        instance
    }

    #[test]
    fn short_fargate_task_is_charged_a_minute() {
        let service = service_with(RateCard::default());
        let task = |start, stop| stopped(InstanceType::EcsTaskFargate, start, stop);

        assert_eq!(service.active_seconds(&task(-4, 40), &day()), 56.0);
        assert_eq!(service.active_seconds(&task(-6, 54), &day()), 54.0);
        assert_eq!(service.active_seconds(&task(-6, 57), &day()), 57.0);
    }

    #[test]
    fn short_ec2_instance_is_charged_an_hour() {
        let service = service_with(RateCard::default());

        let stopped_early = stopped(InstanceType::Ec2Instance, 0, 60);
        assert_eq!(service.active_seconds(&stopped_early, &day()), 3600.0);

        let mut running = stopped(InstanceType::Ec2Instance, 86398, 0);
        running.usage_stop_time = None;
        assert_eq!(service.active_seconds(&running, &day()), 2.0);
    }

    #[test]
    fn instance_outside_window_is_not_active() {
        let service = service_with(RateCard::default());
        let before = stopped(InstanceType::Ec2Instance, -7200, -3600);

        assert_eq!(service.active_seconds(&before, &day()), 0.0);
    }

    #[test]
    fn duplicate_instances_collapse_to_one_key() {
        let service = service_with(RateCard::default());
        let node = stopped(InstanceType::K8sNode, 0, 3600);

        let active = service.active_seconds_by_instance(&[node.clone(), node.clone()], &day());

        assert_eq!(active.len(), 1);
        assert_eq!(active[&node.key()], 3600.0);
    }
}
