mod instance_billing_data;
mod instance_data;

#[rustfmt::skip]
pub use {
    instance_billing_data::InstanceBillingData,
    instance_data::InstanceData,
};
