use serde::{Deserialize, Serialize};

/// CPU units follow the 1024-per-vCPU convention.
pub const CPU_UNITS_PER_VCPU: f64 = 1024.0;
pub const MB_PER_GB: f64 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub cpu_units: f64,
    #[serde(default)]
    pub memory_mb: f64,
}

impl Resource {
    pub fn new(cpu_units: f64, memory_mb: f64) -> Self {
        Self {
            cpu_units,
            memory_mb,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_units <= 0.0 && self.memory_mb <= 0.0
    }

    pub fn vcpus(&self) -> f64 {
        self.cpu_units / CPU_UNITS_PER_VCPU
    }

    pub fn memory_gb(&self) -> f64 {
        self.memory_mb / MB_PER_GB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageResource {
    #[serde(default)]
    pub capacity_mb: f64,
}

impl StorageResource {
    pub fn capacity_gb(&self) -> f64 {
        self.capacity_mb / MB_PER_GB
    }
}
