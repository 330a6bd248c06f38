use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use domain_billing::model::{
    entity::InstanceBillingData,
    vo::{ClaimCostShare, ClaimKey},
};
use rust_decimal::Decimal;

/// Gathers volume rows and claim consumers while the store is swept.
#[derive(Debug, Default)]
pub struct ClaimIndexBuilder {
    volumes: HashMap<ClaimKey, (Option<DateTime<Utc>>, InstanceBillingData)>,
    consumers: HashMap<ClaimKey, HashSet<String>>,
}

impl ClaimIndexBuilder {
    /// Keeps one row per claim: the latest window, then the most recently
    /// started volume. A claim re-bound within a window thus follows its
    /// newest volume.
    pub fn record_volume(
        &mut self,
        claim: ClaimKey,
        usage_start_time: Option<DateTime<Utc>>,
        row: InstanceBillingData,
    ) {
        let newer = |(kept_start, kept): &(Option<DateTime<Utc>>, InstanceBillingData)| {
            (row.start_timestamp, usage_start_time) >= (kept.start_timestamp, *kept_start)
        };
        if self.volumes.get(&claim).map_or(true, newer) {
            self.volumes.insert(claim, (usage_start_time, row));
        }
    }

    pub fn record_consumer(&mut self, claim: ClaimKey, instance_id: &str) {
        self.consumers
            .entry(claim)
            .or_default()
            .insert(instance_id.to_owned());
    }

    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn build(self) -> StorageClaimCostSplitter {
        StorageClaimCostSplitter {
            volumes: self
                .volumes
                .into_iter()
                .map(|(claim, (_, row))| (claim, row))
                .collect(),
            consumer_counts: self
                .consumers
                .into_iter()
                .map(|(claim, consumers)| (claim, consumers.len()))
                .collect(),
        }
    }
}

/// Divides volume cost evenly between the consumers of each claim.
#[derive(Debug, Default)]
pub struct StorageClaimCostSplitter {
    volumes: HashMap<ClaimKey, InstanceBillingData>,
    consumer_counts: HashMap<ClaimKey, usize>,
}

impl StorageClaimCostSplitter {
    /// Consumers of a claim, at least one.
    pub fn consumer_count(&self, claim: &ClaimKey) -> usize {
        self.consumer_counts.get(claim).copied().unwrap_or(1).max(1)
    }

    pub fn split(&self, namespace: &str, claim_names: &[String]) -> ClaimCostShare {
        let mut share = ClaimCostShare::default();
        for claim_name in claim_names {
            let claim = ClaimKey::new(namespace, claim_name.as_str());
            let Some(volume) = self.volumes.get(&claim) else {
                continue;
            };
            let consumers = Decimal::from(self.consumer_count(&claim));
            share.billing_amount += volume.billing_amount / consumers;
            share.idle_cost += volume.storage_idle_cost / consumers;
            share.unallocated_cost += volume.storage_unallocated_cost / consumers;
            share.storage_request += volume.storage_request;
            share.storage_utilization_value += volume.storage_utilization_value;
            share.max_storage_request += volume.max_storage_request;
            share.max_storage_utilization_value += volume.max_storage_utilization_value;
            share.storage_capacity += volume.storage_capacity;
            share.storage_mb_seconds += volume.storage_mb_seconds;
        }
        share
    }
}
