use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain_billing::{
    model::{
        entity::InstanceData,
        vo::{BillingWindow, InstanceKey},
    },
    repository::InstanceDataRepo,
    service::{BillingCalculationService, ParentAttributionService},
};
use tracing::debug;
use typed_builder::TypedBuilder;

#[derive(TypedBuilder)]
pub struct ParentAttributionServiceImpl {
    instance_data_repo: Arc<dyn InstanceDataRepo>,
    calculation_service: Arc<dyn BillingCalculationService>,
}

#[async_trait]
impl ParentAttributionService for ParentAttributionServiceImpl {
    async fn resolve_parent_id(&self, instance: &InstanceData) -> anyhow::Result<Option<String>> {
        let meta = &instance.meta_data;
        if let Some(actual_parent_id) = &meta.actual_parent_resource_id {
            return Ok(Some(actual_parent_id.clone()));
        }
        let is_pod = instance.instance_type.is_some_and(|ty| ty.is_pod());
        let Some(parent_name) = meta.parent_resource_id.as_deref().filter(|_| is_pod) else {
            return Ok(None);
        };
        let parent = self
            .instance_data_repo
            .get_by_name(
                &instance.account_id,
                instance.cluster_id.clone(),
                parent_name,
                Utc::now(),
            )
            .await?;
        Ok(Some(match parent {
            Some(parent) => parent.instance_id,
            None => {
                debug!(
                    "Parent {parent_name} of pod {} not found, keeping its name as id",
                    instance.instance_id
                );
                parent_name.to_owned()
            }
        }))
    }

    fn active_seconds(
        &self,
        parents: &[InstanceData],
        window: &BillingWindow,
    ) -> HashMap<InstanceKey, f64> {
        self.calculation_service
            .active_seconds_by_instance(parents, window)
    }
}
