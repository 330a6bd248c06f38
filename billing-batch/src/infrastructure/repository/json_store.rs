use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_billing::{
    model::{
        entity::{InstanceBillingData, InstanceData},
        vo::{BatchJobType, InstanceState},
    },
    repository::{InstanceBillingDataRepo, InstanceDataRepo, InstanceQuery},
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

const INSTANCES_FILE: &str = "instances.json";
const BILLING_DATA_FILE: &str = "instance_billing_data.json";

/// Instance store and billing sink kept as JSON documents in one directory.
///
/// Every mutation is written back before it returns.
pub struct JsonStore {
    instances: Mutex<Vec<InstanceData>>,
    billing_data: Mutex<Vec<InstanceBillingData>>,
    save_dir: PathBuf,
}

/// Reads a JSON array from `dir/name`. A missing or empty file is an empty
/// collection.
pub async fn load_collection<T: DeserializeOwned>(dir: &Path, name: &str) -> anyhow::Result<Vec<T>> {
    let path = dir.join(name);
    if !path.is_file() {
        return Ok(vec![]);
    }
    let bytes = tokio::fs::read(&path).await?;
    if bytes.is_empty() {
        return Ok(vec![]);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

async fn save_collection<T: Serialize>(dir: &Path, name: &str, items: &[T]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let json = serde_json::to_string_pretty(items)?;
    tokio::fs::write(dir.join(name), json).await?;
    Ok(())
}

impl JsonStore {
    pub async fn new(save_dir: &str) -> anyhow::Result<Self> {
        let save_dir = PathBuf::from(save_dir);
        let instances: Vec<InstanceData> = load_collection(&save_dir, INSTANCES_FILE).await?;
        let billing_data: Vec<InstanceBillingData> =
            load_collection(&save_dir, BILLING_DATA_FILE).await?;
        debug!(
            "Loaded {} instances and {} billing rows from {}",
            instances.len(),
            billing_data.len(),
            save_dir.display()
        );
        Ok(Self {
            instances: Mutex::new(instances),
            billing_data: Mutex::new(billing_data),
            save_dir,
        })
    }

    async fn update_instance(
        &self,
        instance_id: &str,
        cluster_id: &Option<String>,
        update: impl Fn(&mut InstanceData),
    ) -> anyhow::Result<()> {
        let mut instances = self.instances.lock().await;
        let stored = instances
            .iter_mut()
            .find(|x| x.instance_id == instance_id && &x.cluster_id == cluster_id)
            .ok_or(anyhow::anyhow!("No such instance: {instance_id}"))?;
        update(stored);
        save_collection(&self.save_dir, INSTANCES_FILE, &instances).await
    }
}

#[async_trait]
impl InstanceDataRepo for JsonStore {
    async fn get_active_instances(
        &self,
        query: &InstanceQuery,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<InstanceData>> {
        let instances = self.instances.lock().await;
        let mut matching = instances
            .iter()
            .filter(|x| x.account_id == query.account_id)
            .filter(|x| query.cluster_id.is_none() || x.cluster_id == query.cluster_id)
            .filter(|x| {
                x.instance_type
                    .is_some_and(|ty| query.instance_types.contains(&ty))
            })
            .filter(|x| x.usage_start_time.map_or(true, |start| start < query.window.end))
            .filter(|x| {
                x.state == InstanceState::Running
                    || x.usage_stop_time
                        .map_or(true, |stop| stop > query.window.start)
            })
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| {
            (a.usage_start_time, &a.instance_id).cmp(&(b.usage_start_time, &b.instance_id))
        });
        Ok(matching.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn get_by_ids(
        &self,
        account_id: &str,
        instance_ids: &[String],
    ) -> anyhow::Result<Vec<InstanceData>> {
        let instances = self.instances.lock().await;
        Ok(instances
            .iter()
            .filter(|x| x.account_id == account_id && instance_ids.contains(&x.instance_id))
            .cloned()
            .collect())
    }

    async fn get_by_name(
        &self,
        account_id: &str,
        cluster_id: Option<String>,
        instance_name: &str,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Option<InstanceData>> {
        let instances = self.instances.lock().await;
        // Names are reused over time; pick the latest instance started by `as_of`.
        Ok(instances
            .iter()
            .filter(|x| {
                x.account_id == account_id
                    && x.cluster_id == cluster_id
                    && x.instance_name == instance_name
            })
            .filter(|x| x.usage_start_time.map_or(true, |start| start <= as_of))
            .max_by_key(|x| x.usage_start_time)
            .cloned())
    }

    async fn mark_stopped(&self, instance: &InstanceData) -> anyhow::Result<()> {
        self.update_instance(&instance.instance_id, &instance.cluster_id, |stored| {
            stored.state = InstanceState::Stopped
        })
        .await
    }

    async fn initialize_active_iterator(&self, instance: &InstanceData) -> anyhow::Result<()> {
        let cursor = instance.usage_start_time.unwrap_or_else(Utc::now);
        self.update_instance(&instance.instance_id, &instance.cluster_id, |stored| {
            if stored.active_instance_iterator.is_none() {
                stored.active_instance_iterator = Some(cursor)
            }
        })
        .await
    }
}

type RowKey = (String, String, DateTime<Utc>);

fn row_key(row: &InstanceBillingData) -> RowKey {
    let (account_id, instance_id, start) = row.row_key();
    (account_id.to_owned(), instance_id.to_owned(), start)
}

#[async_trait]
impl InstanceBillingDataRepo for JsonStore {
    async fn create(
        &self,
        rows: &[InstanceBillingData],
        job_type: BatchJobType,
    ) -> anyhow::Result<()> {
        let mut billing_data = self.billing_data.lock().await;
        let mut index = billing_data
            .iter()
            .enumerate()
            .map(|(position, x)| (row_key(x), position))
            .collect::<HashMap<_, _>>();
        for row in rows {
            let mut row = row.clone();
            row.batch_job_type = job_type;
            match index.get(&row_key(&row)) {
                Some(&position) => billing_data[position] = row,
                None => {
                    index.insert(row_key(&row), billing_data.len());
                    billing_data.push(row);
                }
            }
        }
        save_collection(&self.save_dir, BILLING_DATA_FILE, &billing_data).await
    }
}
