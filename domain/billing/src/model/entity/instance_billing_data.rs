use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::vo::{BatchJobType, CloudProvider, InstanceType, PricingSource};

/// One billing row, unique on `(account_id, instance_id, start_timestamp)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceBillingData {
    pub account_id: String,
    pub instance_id: String,
    pub instance_name: String,
    pub instance_type: Option<InstanceType>,
    pub cluster_id: Option<String>,
    pub cluster_name: Option<String>,
    pub setting_id: Option<String>,
    pub parent_instance_id: Option<String>,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub batch_job_type: BatchJobType,
    pub pricing_source: PricingSource,

    pub billing_amount: Decimal,
    pub cpu_billing_amount: Decimal,
    pub memory_billing_amount: Decimal,
    pub storage_billing_amount: Decimal,
    pub idle_cost: Decimal,
    pub cpu_idle_cost: Decimal,
    pub memory_idle_cost: Decimal,
    pub storage_idle_cost: Decimal,
    pub system_cost: Decimal,
    pub cpu_system_cost: Decimal,
    pub memory_system_cost: Decimal,
    pub unallocated_cost: Decimal,
    pub storage_unallocated_cost: Decimal,
    pub network_cost: Decimal,

    pub usage_duration_seconds: f64,
    pub cpu_unit_seconds: f64,
    pub memory_mb_seconds: f64,
    pub storage_mb_seconds: f64,

    pub cpu_request: f64,
    pub memory_request: f64,
    pub cpu_limit: f64,
    pub memory_limit: f64,
    pub max_cpu_utilization: f64,
    pub max_memory_utilization: f64,
    pub avg_cpu_utilization: f64,
    pub avg_memory_utilization: f64,
    pub max_cpu_utilization_value: f64,
    pub max_memory_utilization_value: f64,
    pub avg_cpu_utilization_value: f64,
    pub avg_memory_utilization_value: f64,
    pub storage_capacity: f64,
    pub storage_request: f64,
    pub storage_utilization_value: f64,
    pub max_storage_request: f64,
    pub max_storage_utilization_value: f64,

    pub cloud_provider: CloudProvider,
    pub region: Option<String>,
    pub namespace: Option<String>,
    pub workload_name: Option<String>,
    pub workload_type: Option<String>,
    pub launch_type: Option<String>,
    pub ecs_service_name: Option<String>,
    pub task_id: Option<String>,
    pub service_id: Option<String>,
    pub env_id: Option<String>,
    pub app_id: Option<String>,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
}

impl InstanceBillingData {
    pub fn row_key(&self) -> (&str, &str, DateTime<Utc>) {
        (&self.account_id, &self.instance_id, self.start_timestamp)
    }
}
