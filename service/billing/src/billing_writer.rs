use std::sync::Arc;

use domain_billing::{
    model::{
        entity::{InstanceBillingData, InstanceData},
        vo::{
            round_amount, BatchJobType, BillingData, BillingWindow, ClaimCostShare,
            UtilizationData,
        },
    },
    repository::InstanceBillingDataRepo,
};
use tracing::debug;
use typed_builder::TypedBuilder;

/// Everything one billing row is made from.
pub struct BillingRecord<'a> {
    pub instance: &'a InstanceData,
    pub billing: &'a BillingData,
    pub utilization: Option<&'a UtilizationData>,
    pub parent_instance_id: Option<String>,
    pub claim_share: Option<&'a ClaimCostShare>,
    pub window: &'a BillingWindow,
    pub job_type: BatchJobType,
}

#[derive(TypedBuilder)]
pub struct BillingDataWriter {
    instance_billing_data_repo: Arc<dyn InstanceBillingDataRepo>,
}

impl BillingDataWriter {
    pub async fn write(
        &self,
        rows: &[InstanceBillingData],
        job_type: BatchJobType,
    ) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.instance_billing_data_repo.create(rows, job_type).await?;
        debug!("Wrote {} {job_type} billing rows", rows.len());
        Ok(())
    }

    pub fn to_row(record: BillingRecord<'_>) -> InstanceBillingData {
        let BillingRecord {
            instance,
            billing,
            utilization,
            parent_instance_id,
            claim_share,
            window,
            job_type,
        } = record;
        let meta = &instance.meta_data;
        let service_info = instance.service_info.clone().unwrap_or_default();
        let utilization = utilization.copied().unwrap_or_default();
        let breakup = &billing.billing_amount_breakup;
        let idle = &billing.idle_cost_data;
        let system = &billing.system_cost_data;
        let limit = instance.limit();
        let storage_capacity = match instance.storage_resource {
            Some(storage) if storage.capacity_mb > 0.0 => storage.capacity_mb,
            _ => utilization.avg_storage_capacity_value,
        };

        let mut row = InstanceBillingData {
            account_id: instance.account_id.clone(),
            instance_id: instance.instance_id.clone(),
            instance_name: instance.instance_name.clone(),
            instance_type: instance.instance_type,
            cluster_id: instance.cluster_id.clone(),
            cluster_name: instance.cluster_name.clone(),
            setting_id: instance.setting_id.clone(),
            parent_instance_id,
            start_timestamp: window.start,
            end_timestamp: window.end,
            batch_job_type: job_type,
            pricing_source: billing.pricing_source,

            billing_amount: breakup.billing_amount,
            cpu_billing_amount: breakup.cpu_billing_amount,
            memory_billing_amount: breakup.memory_billing_amount,
            storage_billing_amount: breakup.storage_billing_amount,
            idle_cost: idle.idle_cost,
            cpu_idle_cost: idle.cpu_idle_cost,
            memory_idle_cost: idle.memory_idle_cost,
            storage_idle_cost: idle.storage_idle_cost,
            system_cost: system.system_cost,
            cpu_system_cost: system.cpu_system_cost,
            memory_system_cost: system.memory_system_cost,
            unallocated_cost: billing.storage_unallocated_cost,
            storage_unallocated_cost: billing.storage_unallocated_cost,
            network_cost: billing.network_cost,

            usage_duration_seconds: billing.usage_duration_seconds,
            cpu_unit_seconds: billing.cpu_unit_seconds,
            memory_mb_seconds: billing.memory_mb_seconds,
            storage_mb_seconds: billing.storage_mb_seconds,

            cpu_request: instance.total_resource.cpu_units,
            memory_request: instance.total_resource.memory_mb,
            cpu_limit: limit.cpu_units,
            memory_limit: limit.memory_mb,
            max_cpu_utilization: utilization.max_cpu_utilization,
            max_memory_utilization: utilization.max_memory_utilization,
            avg_cpu_utilization: utilization.avg_cpu_utilization,
            avg_memory_utilization: utilization.avg_memory_utilization,
            max_cpu_utilization_value: utilization.max_cpu_utilization_value,
            max_memory_utilization_value: utilization.max_memory_utilization_value,
            avg_cpu_utilization_value: utilization.avg_cpu_utilization_value,
            avg_memory_utilization_value: utilization.avg_memory_utilization_value,
            storage_capacity,
            storage_request: utilization.avg_storage_request_value,
            storage_utilization_value: utilization.avg_storage_usage_value,
            max_storage_request: utilization.max_storage_request_value,
            max_storage_utilization_value: utilization.max_storage_usage_value,

            cloud_provider: meta.cloud_provider,
            region: meta.region.clone(),
            namespace: meta.namespace.clone().or_else(|| meta.claim_namespace.clone()),
            workload_name: meta.workload_name.clone(),
            workload_type: meta.workload_type.clone(),
            launch_type: meta.launch_type.clone(),
            ecs_service_name: meta.ecs_service_name.clone(),
            task_id: meta.task_id.clone(),
            service_id: service_info.service_id,
            env_id: service_info.env_id,
            app_id: service_info.app_id,
            org_id: service_info.org_id,
            project_id: service_info.project_id,
        };

        if let Some(share) = claim_share {
            row.billing_amount += share.billing_amount;
            row.storage_billing_amount += share.billing_amount;
            row.idle_cost += share.idle_cost;
            row.storage_idle_cost += share.idle_cost;
            row.unallocated_cost += share.unallocated_cost;
            row.storage_unallocated_cost += share.unallocated_cost;
            row.storage_request += share.storage_request;
            row.storage_utilization_value += share.storage_utilization_value;
            row.max_storage_request += share.max_storage_request;
            row.max_storage_utilization_value += share.max_storage_utilization_value;
            row.storage_capacity += share.storage_capacity;
            row.storage_mb_seconds += share.storage_mb_seconds;
        }

        round_amounts(&mut row);
        row
    }
}

fn round_amounts(row: &mut InstanceBillingData) {
    for amount in [
        &mut row.billing_amount,
        &mut row.cpu_billing_amount,
        &mut row.memory_billing_amount,
        &mut row.storage_billing_amount,
        &mut row.idle_cost,
        &mut row.cpu_idle_cost,
        &mut row.memory_idle_cost,
        &mut row.storage_idle_cost,
        &mut row.system_cost,
        &mut row.cpu_system_cost,
        &mut row.memory_system_cost,
        &mut row.unallocated_cost,
        &mut row.storage_unallocated_cost,
        &mut row.network_cost,
    ] {
        *amount = round_amount(*amount);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use domain_billing::{
        mock::MockInstanceBillingDataRepo,
        model::vo::{BillingAmountBreakup, InstanceType, Resource, ServiceInfo},
    };
    use rust_decimal::Decimal;

    use super::*;

    fn window() -> BillingWindow {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        BillingWindow::new(start, start + Duration::days(1))
    }

    fn pod() -> InstanceData {
        let mut pod = InstanceData {
            account_id: "account".to_string(),
            instance_id: "pod-a".to_string(),
            instance_type: Some(InstanceType::K8sPod),
            total_resource: Resource::new(1024.0, 2048.0),
            service_info: Some(ServiceInfo {
                service_id: Some("svc".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        pod.meta_data.namespace = Some("ns".to_string());
        pod
    }

    #[test]
    fn claim_share_is_added_to_storage_and_totals() {
        let pod = pod();
        let billing = BillingData {
            billing_amount_breakup: BillingAmountBreakup {
                billing_amount: Decimal::from(2),
                cpu_billing_amount: Decimal::ONE,
                memory_billing_amount: Decimal::ONE,
                storage_billing_amount: Decimal::ZERO,
            },
            ..Default::default()
        };
        let share = ClaimCostShare {
            billing_amount: Decimal::from(5),
            unallocated_cost: Decimal::from(3),
            storage_request: 40.0,
            ..Default::default()
        };

        let row = BillingDataWriter::to_row(BillingRecord {
            instance: &pod,
            billing: &billing,
            utilization: None,
            parent_instance_id: Some("node".to_string()),
            claim_share: Some(&share),
            window: &window(),
            job_type: BatchJobType::InstanceBilling,
        });

        assert_eq!(row.billing_amount, Decimal::from(7));
        assert_eq!(row.storage_billing_amount, Decimal::from(5));
        assert_eq!(row.storage_unallocated_cost, Decimal::from(3));
        assert_eq!(row.unallocated_cost, Decimal::from(3));
        assert_eq!(row.storage_request, 40.0);
        assert_eq!(row.start_timestamp, window().start);
        assert_eq!(row.parent_instance_id.as_deref(), Some("node"));
        assert_eq!(row.namespace.as_deref(), Some("ns"));
        assert_eq!(row.service_id.as_deref(), Some("svc"));
        assert_eq!(row.cpu_request, 1024.0);
    }

    #[test]
    fn amounts_are_rounded() {
        let pod = pod();
        let billing = BillingData {
            billing_amount_breakup: BillingAmountBreakup {
                billing_amount: Decimal::new(1_234_567_890_123, 12),
                ..Default::default()
            },
            ..Default::default()
        };

        let row = BillingDataWriter::to_row(BillingRecord {
            instance: &pod,
            billing: &billing,
            utilization: None,
            parent_instance_id: None,
            claim_share: None,
            window: &window(),
            job_type: BatchJobType::InstanceBillingHourly,
        });

        assert_eq!(row.billing_amount, Decimal::new(12_345_678_901, 10));
        assert_eq!(row.batch_job_type, BatchJobType::InstanceBillingHourly);
    }

    #[tokio::test]
    async fn empty_batches_skip_the_sink() {
        let mut repo = MockInstanceBillingDataRepo::new();
        repo.expect_create().never();
        let writer = BillingDataWriter::builder()
            .instance_billing_data_repo(Arc::new(repo))
            .build();

        writer.write(&[], BatchJobType::InstanceBilling).await.unwrap();
    }
}
