use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_billing::{
    model::{
        entity::InstanceData,
        vo::{BillingWindow, UtilizationData},
    },
    service::UtilizationService,
};
use serde::{Deserialize, Serialize};

use crate::infrastructure::repository::load_collection;

const SAMPLES_FILE: &str = "utilization_samples.json";

/// One metrics scrape of an instance. CPU in units, everything else in MB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub account_id: String,
    pub instance_id: String,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub setting_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cpu_units: f64,
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default)]
    pub storage_request_mb: f64,
    #[serde(default)]
    pub storage_usage_mb: f64,
    #[serde(default)]
    pub storage_capacity_mb: f64,
}

#[derive(Default)]
struct Accumulator {
    count: f64,
    max: f64,
    sum: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.max = if self.count == 0.0 { value } else { self.max.max(value) };
        self.sum += value;
        self.count += 1.0;
    }

    fn avg(&self) -> f64 {
        if self.count == 0.0 {
            0.0
        } else {
            self.sum / self.count
        }
    }
}

fn fraction(value: f64, request: f64) -> f64 {
    if request > 0.0 {
        value / request
    } else {
        0.0
    }
}

/// Aggregates the samples of one instance. Fractions are relative to its
/// requested resources.
fn aggregate<'a>(
    instance: &InstanceData,
    samples: impl Iterator<Item = &'a UtilizationSample>,
) -> Option<UtilizationData> {
    let (mut cpu, mut memory) = (Accumulator::default(), Accumulator::default());
    let (mut request, mut usage, mut capacity) = (
        Accumulator::default(),
        Accumulator::default(),
        Accumulator::default(),
    );
    for sample in samples {
        cpu.push(sample.cpu_units);
        memory.push(sample.memory_mb);
        request.push(sample.storage_request_mb);
        usage.push(sample.storage_usage_mb);
        capacity.push(sample.storage_capacity_mb);
    }
    if cpu.count == 0.0 {
        return None;
    }
    let total = instance.total_resource;
    Some(UtilizationData {
        max_cpu_utilization: fraction(cpu.max, total.cpu_units),
        max_memory_utilization: fraction(memory.max, total.memory_mb),
        avg_cpu_utilization: fraction(cpu.avg(), total.cpu_units),
        avg_memory_utilization: fraction(memory.avg(), total.memory_mb),
        max_cpu_utilization_value: cpu.max,
        max_memory_utilization_value: memory.max,
        avg_cpu_utilization_value: cpu.avg(),
        avg_memory_utilization_value: memory.avg(),
        avg_storage_request_value: request.avg(),
        avg_storage_usage_value: usage.avg(),
        avg_storage_capacity_value: capacity.avg(),
        max_storage_request_value: request.max,
        max_storage_usage_value: usage.max,
    })
}

/// Utilization aggregated from raw samples kept in a JSON file.
pub struct JsonUtilizationService {
    samples: Vec<UtilizationSample>,
}

impl JsonUtilizationService {
    pub async fn new(save_dir: &str) -> anyhow::Result<Self> {
        Ok(Self {
            samples: load_collection(Path::new(save_dir), SAMPLES_FILE).await?,
        })
    }
}

#[async_trait]
impl UtilizationService for JsonUtilizationService {
    async fn get_utilization(
        &self,
        instances: &[InstanceData],
        window: &BillingWindow,
        account_id: &str,
        setting_id: Option<String>,
        cluster_id: Option<String>,
    ) -> anyhow::Result<HashMap<String, UtilizationData>> {
        let mut by_instance: HashMap<&str, Vec<&UtilizationSample>> = HashMap::new();
        for sample in self.samples.iter().filter(|x| {
            x.account_id == account_id
                && x.timestamp >= window.start
                && x.timestamp < window.end
                && (cluster_id.is_none() || x.cluster_id == cluster_id)
                && (setting_id.is_none() || x.setting_id == setting_id)
        }) {
            by_instance
                .entry(sample.instance_id.as_str())
                .or_default()
                .push(sample);
        }
        Ok(instances
            .iter()
            .filter_map(|instance| {
                let samples = by_instance.get(instance.instance_id.as_str())?;
                let data = aggregate(instance, samples.iter().copied())?;
                Some((instance.instance_id.clone(), data))
            })
            .collect())
    }
}
