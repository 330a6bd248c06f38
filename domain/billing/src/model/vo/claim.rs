use std::fmt;

use serde::{Deserialize, Serialize};

/// A persistent volume claim, addressed by namespace and name.
///
/// The key carries no cluster. When several clusters are billed in one run,
/// claims with the same namespace and name in different clusters share their
/// volumes and consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimKey {
    pub namespace: String,
    pub claim_name: String,
}

impl ClaimKey {
    pub fn new(namespace: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            claim_name: claim_name.into(),
        }
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.claim_name)
    }
}

/// An instance id scoped to its cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub instance_id: String,
    pub cluster_id: Option<String>,
}

impl InstanceKey {
    pub fn new(instance_id: impl Into<String>, cluster_id: Option<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            cluster_id,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cluster_id {
            Some(cluster_id) => write!(f, "{}:{}", self.instance_id, cluster_id),
            None => f.write_str(&self.instance_id),
        }
    }
}
