use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_billing::{
    model::vo::{BillingWindow, CloudProvider, ResourceCost},
    service::{BillingExportMetadataService, BillingExportService},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::infrastructure::repository::load_collection;

const LINE_ITEMS_FILE: &str = "billing_export.json";
const DATASETS_FILE: &str = "billing_export_datasets.json";

/// One cost line of a provider billing export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportLineItem {
    pub provider: CloudProvider,
    pub dataset_id: String,
    pub resource_id: String,
    pub usage_start: DateTime<Utc>,
    pub compute_cost: Decimal,
    #[serde(default)]
    pub network_cost: Decimal,
}

/// Which export dataset carries an account's costs for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDataset {
    pub account_id: String,
    pub provider: CloudProvider,
    pub dataset_id: String,
}

/// Billing exports dumped to JSON files.
pub struct JsonBillingExport {
    line_items: Vec<ExportLineItem>,
    datasets: Vec<ExportDataset>,
}

impl JsonBillingExport {
    pub async fn new(save_dir: &str) -> anyhow::Result<Self> {
        let dir = Path::new(save_dir);
        Ok(Self {
            line_items: load_collection(dir, LINE_ITEMS_FILE).await?,
            datasets: load_collection(dir, DATASETS_FILE).await?,
        })
    }
}

#[async_trait]
impl BillingExportService for JsonBillingExport {
    /// Sums the line items of each resource that start inside the window.
    async fn get_resource_costs(
        &self,
        provider: CloudProvider,
        dataset_id: &str,
        resource_ids: &[String],
        window: &BillingWindow,
    ) -> anyhow::Result<Vec<ResourceCost>> {
        let mut costs: BTreeMap<&str, ResourceCost> = BTreeMap::new();
        for item in self.line_items.iter().filter(|x| {
            x.provider == provider
                && x.dataset_id == dataset_id
                && x.usage_start >= window.start
                && x.usage_start < window.end
                && resource_ids.contains(&x.resource_id)
        }) {
            let cost = costs
                .entry(item.resource_id.as_str())
                .or_insert_with(|| ResourceCost {
                    resource_id: item.resource_id.clone(),
                    ..Default::default()
                });
            cost.compute_cost += item.compute_cost;
            cost.network_cost += item.network_cost;
        }
        debug!("{provider} export {dataset_id} priced {} resources", costs.len());
        Ok(costs.into_values().collect())
    }
}

#[async_trait]
impl BillingExportMetadataService for JsonBillingExport {
    async fn get_dataset_id(
        &self,
        account_id: &str,
        provider: CloudProvider,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .datasets
            .iter()
            .find(|x| x.account_id == account_id && x.provider == provider)
            .map(|x| x.dataset_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn item(resource_id: &str, usage_start: DateTime<Utc>, cost: i64) -> ExportLineItem {
        ExportLineItem {
            provider: CloudProvider::Aws,
            dataset_id: "cur".to_string(),
            resource_id: resource_id.to_string(),
            usage_start,
            compute_cost: Decimal::from(cost),
            network_cost: Decimal::ONE,
        }
    }

    #[tokio::test]
    async fn line_items_inside_the_window_are_summed() {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let window = BillingWindow::new(start, start + Duration::days(1));
        let export = JsonBillingExport {
            line_items: vec![
                item("i-1", start, 2),
                item("i-1", start + Duration::hours(5), 3),
                item("i-1", start + Duration::days(1), 100),
                item("i-2", start, 7),
            ],
            datasets: vec![],
        };

        let costs = export
            .get_resource_costs(CloudProvider::Aws, "cur", &["i-1".to_string()], &window)
            .await
            .unwrap();

        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].compute_cost, Decimal::from(5));
        assert_eq!(costs[0].network_cost, Decimal::from(2));
    }

    #[tokio::test]
    async fn dataset_is_looked_up_per_account_and_provider() {
        let export = JsonBillingExport {
            line_items: vec![],
            datasets: vec![ExportDataset {
                account_id: "account".to_string(),
                provider: CloudProvider::Gcp,
                dataset_id: "billing_export".to_string(),
            }],
        };

        assert_eq!(
            export
                .get_dataset_id("account", CloudProvider::Gcp)
                .await
                .unwrap()
                .as_deref(),
            Some("billing_export")
        );
        assert!(export
            .get_dataset_id("account", CloudProvider::Aws)
            .await
            .unwrap()
            .is_none());
    }
}
