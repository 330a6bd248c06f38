use std::collections::HashMap;

use crate::exception::BillingResult;
use crate::model::{
    entity::InstanceData,
    vo::{BillingData, BillingWindow, InstanceKey, UtilizationData},
};

pub trait BillingCalculationService: Send + Sync {
    /// Cost of `instance` over `window`.
    ///
    /// `parent_active_seconds` is the active time of the machine the instance
    /// runs on, used to turn window-total prices into hourly ones.
    fn compute(
        &self,
        instance: &InstanceData,
        utilization: Option<&UtilizationData>,
        parent_active_seconds: Option<f64>,
        window: &BillingWindow,
    ) -> BillingResult<BillingData>;

    /// Chargeable seconds of `instance` inside `window`.
    fn active_seconds(&self, instance: &InstanceData, window: &BillingWindow) -> f64;

    fn active_seconds_by_instance(
        &self,
        instances: &[InstanceData],
        window: &BillingWindow,
    ) -> HashMap<InstanceKey, f64>;
}
