use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::vo::BillingPass;

pub type BillingResult<T> = Result<T, BillingException>;

#[derive(Error, Debug)]
pub enum BillingException {
    #[error("Billing window must end after it starts, got [{start}, {end}).")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Instance {instance_id} has no instance type and cannot be billed.")]
    MissingInstanceType { instance_id: String },

    #[error(
        "{pass} pass failed on chunk {chunk_index} of cluster {cluster_id} (first instance: {first_instance_id}): {source}"
    )]
    ChunkFailed {
        pass: BillingPass,
        cluster_id: String,
        chunk_index: usize,
        first_instance_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Billing internal error: {source}")]
    InternalError {
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for BillingException {
    fn from(e: anyhow::Error) -> Self {
        BillingException::InternalError { source: e }
    }
}
