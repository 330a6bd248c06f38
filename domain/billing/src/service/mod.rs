mod billing_calculation;
mod cluster_filter;
mod feature_flag;
mod parent_attribution;
mod pricing;
mod utilization;

#[rustfmt::skip]
pub use {
    billing_calculation::BillingCalculationService,
    cluster_filter::ClusterFilterPolicy,
    feature_flag::{FeatureFlagService, CLUSTER_SCOPED_BILLING},
    parent_attribution::ParentAttributionService,
    pricing::{BillingExportMetadataService, BillingExportService, PricingCache},
    utilization::UtilizationService,
};
