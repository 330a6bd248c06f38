mod cluster;
mod instance_billing_data;
mod instance_data;

#[rustfmt::skip]
pub use {
    cluster::ClusterRegistry,
    instance_billing_data::InstanceBillingDataRepo,
    instance_data::{InstanceDataRepo, InstanceQuery},
};
