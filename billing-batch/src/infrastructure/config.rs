use std::collections::HashMap;

use chrono::{DateTime, Duration, DurationRound, Utc};
use domain_billing::model::vo::{BatchJobType, BillingWindow, RateCard};
use infrastructure_common::config::CommonConfig;
use serde::Deserialize;

#[derive(Default, Clone, Deserialize, Debug)]
pub struct BillingBatchConfig {
    #[serde(default, flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub cluster_filter: ClusterFilterConfig,
    #[serde(default)]
    pub feature_flags: FeatureFlagConfig,
    #[serde(default)]
    pub job: JobConfig,
}

#[derive(Clone, Deserialize, Debug)]
pub struct BatchConfig {
    #[serde(default = "BatchConfig::default_chunk_size")]
    pub chunk_size: usize,
    /// Instances still marked running this many days after their recorded
    /// stop time are flipped to stopped.
    #[serde(default = "BatchConfig::default_stale_running_repair_days")]
    pub stale_running_repair_days: i64,
}

impl BatchConfig {
    fn default_chunk_size() -> usize {
        500
    }
    fn default_stale_running_repair_days() -> i64 {
        3
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            stale_running_repair_days: Self::default_stale_running_repair_days(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct PricingConfig {
    #[serde(default)]
    pub rate_card: RateCard,
    #[serde(default = "PricingConfig::default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,
}

impl PricingConfig {
    fn default_cache_ttl_secs() -> i64 {
        60 * 60
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::seconds(self.cache_ttl_secs.max(0))
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rate_card: Default::default(),
            cache_ttl_secs: Self::default_cache_ttl_secs(),
        }
    }
}

#[derive(Default, Clone, Deserialize, Debug)]
pub struct ClusterFilterConfig {
    /// Never billed.
    #[serde(default)]
    pub excluded_cluster_ids: Vec<String>,
    /// Clusters billed only for windows starting at or after the given time.
    #[serde(default)]
    pub billing_start: HashMap<String, DateTime<Utc>>,
}

#[derive(Default, Clone, Deserialize, Debug)]
pub struct FeatureFlagConfig {
    #[serde(default)]
    pub cluster_scoped_billing: bool,
    #[serde(default)]
    pub cluster_scoped_billing_accounts: Vec<String>,
}

/// The single invocation this process runs.
#[derive(Default, Clone, Deserialize, Debug)]
pub struct JobConfig {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub job_type: BatchJobType,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl JobConfig {
    /// The configured window, or the last complete day (hour for hourly
    /// jobs) before `now` when either bound is missing.
    pub fn window(&self, now: DateTime<Utc>) -> anyhow::Result<BillingWindow> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            return Ok(BillingWindow::new(start, end));
        }
        let period = match self.job_type {
            BatchJobType::InstanceBilling => Duration::days(1),
            BatchJobType::InstanceBillingHourly => Duration::hours(1),
        };
        let end = now.duration_trunc(period)?;
        Ok(BillingWindow::new(end - period, end))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use indoc::indoc;

    use super::*;

    fn parse(yaml: &str) -> BillingBatchConfig {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_apply_to_an_empty_file() {
        let config = parse("{}");

        assert_eq!(config.batch.chunk_size, 500);
        assert_eq!(config.batch.stale_running_repair_days, 3);
        assert_eq!(config.pricing.cache_ttl(), Duration::hours(1));
        assert_eq!(config.common.store().path(), "./data");
        assert!(!config.feature_flags.cluster_scoped_billing);
    }

    #[test]
    fn job_and_sections_are_read() {
        let config = parse(indoc! {"
            store:
              path: /srv/billing
            batch:
              chunk_size: 50
            cluster_filter:
              excluded_cluster_ids: [dev]
            job:
              account_id: account
              job_type: INSTANCE_BILLING_HOURLY
              start: 2023-05-01T00:00:00Z
              end: 2023-05-01T01:00:00Z
        "});

        assert_eq!(config.batch.chunk_size, 50);
        assert_eq!(config.common.store().path(), "/srv/billing");
        assert_eq!(config.cluster_filter.excluded_cluster_ids, vec!["dev"]);
        assert_eq!(config.job.account_id, "account");
        assert_eq!(config.job.job_type, BatchJobType::InstanceBillingHourly);
        let window = config.job.window(Utc::now()).unwrap();
        assert_eq!(window.duration_seconds(), 3600.0);
    }

    #[test]
    fn missing_bounds_bill_the_previous_period() {
        let now = Utc.with_ymd_and_hms(2023, 5, 2, 13, 20, 0).unwrap();
        let daily = JobConfig::default();
        let hourly = JobConfig {
            job_type: BatchJobType::InstanceBillingHourly,
            ..Default::default()
        };

        let day = daily.window(now).unwrap();
        let hour = hourly.window(now).unwrap();

        assert_eq!(day.start, Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(day.end, Utc.with_ymd_and_hms(2023, 5, 2, 0, 0, 0).unwrap());
        assert_eq!(hour.start, Utc.with_ymd_and_hms(2023, 5, 2, 12, 0, 0).unwrap());
        assert_eq!(hour.end, Utc.with_ymd_and_hms(2023, 5, 2, 13, 0, 0).unwrap());
    }
}
