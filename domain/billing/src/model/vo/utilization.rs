use serde::{Deserialize, Serialize};

/// Utilization summary of one instance over a billing window.
///
/// Fractions are relative to the instance's request, values are absolute
/// (CPU units, MB).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilizationData {
    pub max_cpu_utilization: f64,
    pub max_memory_utilization: f64,
    pub avg_cpu_utilization: f64,
    pub avg_memory_utilization: f64,
    pub max_cpu_utilization_value: f64,
    pub max_memory_utilization_value: f64,
    pub avg_cpu_utilization_value: f64,
    pub avg_memory_utilization_value: f64,
    pub avg_storage_request_value: f64,
    pub avg_storage_usage_value: f64,
    pub avg_storage_capacity_value: f64,
    pub max_storage_request_value: f64,
    pub max_storage_usage_value: f64,
}
