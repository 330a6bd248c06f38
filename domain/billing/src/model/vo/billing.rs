use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::PricingSource;

/// Fractional digits kept on persisted amounts.
pub const AMOUNT_SCALE: u32 = 10;

/// Nearest decimal of a float, non-finite inputs become zero.
pub fn to_money(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or_default()
}

pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BillingAmountBreakup {
    pub billing_amount: Decimal,
    pub cpu_billing_amount: Decimal,
    pub memory_billing_amount: Decimal,
    pub storage_billing_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IdleCostData {
    pub idle_cost: Decimal,
    pub cpu_idle_cost: Decimal,
    pub memory_idle_cost: Decimal,
    pub storage_idle_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemCostData {
    pub system_cost: Decimal,
    pub cpu_system_cost: Decimal,
    pub memory_system_cost: Decimal,
}

/// Cost of one instance over one window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BillingData {
    pub billing_amount_breakup: BillingAmountBreakup,
    pub idle_cost_data: IdleCostData,
    pub system_cost_data: SystemCostData,
    pub storage_unallocated_cost: Decimal,
    pub network_cost: Decimal,
    pub usage_duration_seconds: f64,
    pub cpu_unit_seconds: f64,
    pub memory_mb_seconds: f64,
    pub storage_mb_seconds: f64,
    pub pricing_source: PricingSource,
}

/// A consumer's share of the persistent volumes behind its claims.
///
/// Request and utilization figures are the volumes' full values, only the
/// amounts are divided between consumers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClaimCostShare {
    pub billing_amount: Decimal,
    pub idle_cost: Decimal,
    pub unallocated_cost: Decimal,
    pub storage_request: f64,
    pub storage_utilization_value: f64,
    pub max_storage_request: f64,
    pub max_storage_utilization_value: f64,
    pub storage_capacity: f64,
    pub storage_mb_seconds: f64,
}

impl ClaimCostShare {
    pub fn is_empty(&self) -> bool {
        self.billing_amount.is_zero()
            && self.idle_cost.is_zero()
            && self.unallocated_cost.is_zero()
            && self.storage_request == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_money_is_zero() {
        assert_eq!(to_money(f64::NAN), Decimal::ZERO);
        assert_eq!(to_money(f64::INFINITY), Decimal::ZERO);
        assert_eq!(to_money(0.25), Decimal::new(25, 2));
    }

    #[test]
    fn rounding_is_bankers() {
        assert_eq!(
            round_amount(Decimal::new(5, 11)),
            Decimal::ZERO,
            "0.00000000005 rounds half to even"
        );
        assert_eq!(round_amount(Decimal::new(15, 11)), Decimal::new(2, 10));
    }
}
