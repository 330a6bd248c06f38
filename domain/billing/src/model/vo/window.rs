use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` a billing invocation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BillingWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.start, self.end).max(0.0)
    }

    /// Seconds of `[from, to)` that fall inside the window, `0` when they don't overlap.
    pub fn overlap_seconds(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        let start = from.max(self.start);
        let end = to.min(self.end);
        if end <= start {
            return 0.0;
        }
        seconds_between(start, end)
    }
}

impl fmt::Display for BillingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Granularity tag persisted with every billing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchJobType {
    #[default]
    InstanceBilling,
    InstanceBillingHourly,
}

impl fmt::Display for BatchJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchJobType::InstanceBilling => write!(f, "INSTANCE_BILLING"),
            BatchJobType::InstanceBillingHourly => write!(f, "INSTANCE_BILLING_HOURLY"),
        }
    }
}

/// The three sweeps one invocation makes over the instance store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingPass {
    PersistentVolume,
    ClaimConsumerScan,
    General,
}

impl fmt::Display for BillingPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingPass::PersistentVolume => write!(f, "persistent volume"),
            BillingPass::ClaimConsumerScan => write!(f, "claim consumer scan"),
            BillingPass::General => write!(f, "general"),
        }
    }
}
