mod billing_export;
mod config_policy;
mod utilization;

#[rustfmt::skip]
pub use {
    billing_export::JsonBillingExport,
    config_policy::{ConfigClusterFilterPolicy, ConfigFeatureFlagService},
    utilization::JsonUtilizationService,
};
