use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceType {
    K8sNode,
    K8sPod,
    K8sPodFargate,
    K8sPv,
    K8sPvc,
    EcsTaskEc2,
    EcsTaskFargate,
    EcsContainerInstance,
    Ec2Instance,
}

/// How an instance type's cost is put together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostComposition {
    /// A whole machine priced on its own.
    ComputeHost,
    /// A workload that receives a share of its host machine's price.
    HostedWorkload,
    /// Priced per vCPU-hour and GB-hour of its own resources.
    UnitPriced,
    /// Priced per GB-month of provisioned capacity.
    Storage,
    /// Usage signals only, its cost reaches consumers through the claim split.
    Claim,
}

impl InstanceType {
    pub const ALL: [InstanceType; 9] = [
        InstanceType::K8sNode,
        InstanceType::K8sPod,
        InstanceType::K8sPodFargate,
        InstanceType::K8sPv,
        InstanceType::K8sPvc,
        InstanceType::EcsTaskEc2,
        InstanceType::EcsTaskFargate,
        InstanceType::EcsContainerInstance,
        InstanceType::Ec2Instance,
    ];

    pub const fn cost_composition(self) -> CostComposition {
        match self {
            InstanceType::K8sNode
            | InstanceType::EcsContainerInstance
            | InstanceType::Ec2Instance => CostComposition::ComputeHost,
            InstanceType::K8sPod | InstanceType::EcsTaskEc2 => CostComposition::HostedWorkload,
            InstanceType::K8sPodFargate | InstanceType::EcsTaskFargate => {
                CostComposition::UnitPriced
            }
            InstanceType::K8sPv => CostComposition::Storage,
            InstanceType::K8sPvc => CostComposition::Claim,
        }
    }

    /// Shortest lifetime the provider charges for once the instance stopped.
    pub const fn min_chargeable_seconds(self) -> f64 {
        match self {
            InstanceType::Ec2Instance => 3600.0,
            InstanceType::EcsTaskFargate | InstanceType::K8sPodFargate => 60.0,
            _ => 0.0,
        }
    }

    pub const fn is_pod(self) -> bool {
        matches!(self, InstanceType::K8sPod | InstanceType::K8sPodFargate)
    }

    /// Every type except persistent volumes, which get their own pass.
    pub fn general_pass_types() -> Vec<InstanceType> {
        Self::ALL
            .into_iter()
            .filter(|ty| *ty != InstanceType::K8sPv)
            .collect()
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceType::K8sNode => "K8S_NODE",
            InstanceType::K8sPod => "K8S_POD",
            InstanceType::K8sPodFargate => "K8S_POD_FARGATE",
            InstanceType::K8sPv => "K8S_PV",
            InstanceType::K8sPvc => "K8S_PVC",
            InstanceType::EcsTaskEc2 => "ECS_TASK_EC2",
            InstanceType::EcsTaskFargate => "ECS_TASK_FARGATE",
            InstanceType::EcsContainerInstance => "ECS_CONTAINER_INSTANCE",
            InstanceType::Ec2Instance => "EC2_INSTANCE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Initializing,
    #[default]
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
    Ibm,
    OnPrem,
    #[default]
    Unknown,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Azure => "AZURE",
            CloudProvider::Gcp => "GCP",
            CloudProvider::Ibm => "IBM",
            CloudProvider::OnPrem => "ON_PREM",
            CloudProvider::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Purchase option of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceCategory {
    #[default]
    OnDemand,
    Spot,
    Reserved,
}
