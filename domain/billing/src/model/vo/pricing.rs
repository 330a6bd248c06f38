use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::CloudProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingSource {
    /// Negotiated cost taken from the provider's billing export.
    Custom,
    /// Public rate card.
    List,
    /// Built-in default rates.
    #[default]
    Hardcoded,
}

impl fmt::Display for PricingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingSource::Custom => write!(f, "CUSTOM"),
            PricingSource::List => write!(f, "LIST"),
            PricingSource::Hardcoded => write!(f, "HARDCODED"),
        }
    }
}

/// Price resolved for one instance.
///
/// Either a whole-entity `price_per_hour` for an entity of `capacity`, or
/// per-unit rates when `cpu_price_per_hour`/`memory_price_per_hour` are set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PricingData {
    pub price_per_hour: Decimal,
    /// Per vCPU-hour.
    pub cpu_price_per_hour: Decimal,
    /// Per GB-hour.
    pub memory_price_per_hour: Decimal,
    /// CPU units of the priced entity.
    pub cpu_units: f64,
    /// Memory MB of the priced entity.
    pub memory_mb: f64,
    pub network_cost: Decimal,
    pub pricing_source: PricingSource,
}

impl PricingData {
    pub fn is_unit_priced(&self) -> bool {
        self.cpu_price_per_hour > Decimal::ZERO || self.memory_price_per_hour > Decimal::ZERO
    }
}

/// Window total of one resource as reported by a billing export.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceCost {
    pub resource_id: String,
    pub compute_cost: Decimal,
    #[serde(default)]
    pub network_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmListPrice {
    pub provider: CloudProvider,
    pub family: String,
    pub region: String,
    pub on_demand_price: Decimal,
    #[serde(default)]
    pub spot_price: Option<Decimal>,
    pub cpus: f64,
    pub memory_gb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitRate {
    /// Per vCPU-hour.
    pub cpu_price_per_hour: Decimal,
    /// Per GB-hour.
    pub memory_price_per_hour: Decimal,
}

/// Public and default prices the pricing cache falls back on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    #[serde(default)]
    pub vm_prices: Vec<VmListPrice>,
    #[serde(default)]
    pub fargate_rates: HashMap<String, UnitRate>,
    #[serde(default = "RateCard::default_fargate_rate")]
    pub default_fargate_rate: UnitRate,
    #[serde(default = "RateCard::default_unit_rate")]
    pub default_unit_rate: UnitRate,
    /// Per GB-month, keyed by storage class.
    #[serde(default)]
    pub storage_prices: HashMap<String, Decimal>,
    #[serde(default = "RateCard::default_storage_price")]
    pub default_storage_price: Decimal,
}

impl RateCard {
    fn default_fargate_rate() -> UnitRate {
        UnitRate {
            cpu_price_per_hour: Decimal::new(4048, 5),
            memory_price_per_hour: Decimal::new(4445, 6),
        }
    }

    fn default_unit_rate() -> UnitRate {
        UnitRate {
            cpu_price_per_hour: Decimal::new(16, 3),
            memory_price_per_hour: Decimal::new(8, 3),
        }
    }

    fn default_storage_price() -> Decimal {
        Decimal::new(4, 2)
    }

    pub fn vm_price(
        &self,
        provider: CloudProvider,
        family: &str,
        region: &str,
    ) -> Option<&VmListPrice> {
        self.vm_prices.iter().find(|price| {
            price.provider == provider && price.family == family && price.region == region
        })
    }
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            vm_prices: vec![],
            fargate_rates: HashMap::new(),
            default_fargate_rate: Self::default_fargate_rate(),
            default_unit_rate: Self::default_unit_rate(),
            storage_prices: HashMap::new(),
            default_storage_price: Self::default_storage_price(),
        }
    }
}
