mod billing_calculation;
mod billing_writer;
mod instance_reader;
mod parent_attribution;
mod pricing;
mod storage_claim;
mod tasklet;

pub use billing_calculation::BillingCalculationServiceImpl;
pub use billing_writer::{BillingDataWriter, BillingRecord};
pub use instance_reader::InstanceChunkReader;
pub use parent_attribution::ParentAttributionServiceImpl;
pub use pricing::ProviderPricingCacheImpl;
pub use storage_claim::{ClaimIndexBuilder, StorageClaimCostSplitter};
pub use tasklet::{InstanceBillingDataTasklet, TaskletSummary};
