mod billing;
mod claim;
mod instance_type;
mod meta_data;
mod pricing;
mod resource;
mod utilization;
mod window;

#[rustfmt::skip]
pub use {
    billing::*,
    claim::{ClaimKey, InstanceKey},
    instance_type::{CloudProvider, CostComposition, InstanceCategory, InstanceState, InstanceType},
    meta_data::{InstanceMetaData, ServiceInfo},
    pricing::{PricingData, PricingSource, RateCard, ResourceCost, UnitRate, VmListPrice},
    resource::{Resource, StorageResource, CPU_UNITS_PER_VCPU, MB_PER_GB},
    utilization::UtilizationData,
    window::{seconds_between, BatchJobType, BillingPass, BillingWindow},
};
