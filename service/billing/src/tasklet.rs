use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Duration;
use domain_billing::{
    exception::{BillingException, BillingResult},
    model::{
        entity::{InstanceBillingData, InstanceData},
        vo::{
            BatchJobType, BillingPass, BillingWindow, CloudProvider, InstanceKey, InstanceState,
            InstanceType, UtilizationData,
        },
    },
    repository::{ClusterRegistry, InstanceDataRepo, InstanceQuery},
    service::{
        BillingCalculationService, BillingExportMetadataService, ClusterFilterPolicy,
        FeatureFlagService, ParentAttributionService, PricingCache, UtilizationService,
        CLUSTER_SCOPED_BILLING,
    },
};
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::{
    BillingDataWriter, BillingRecord, ClaimIndexBuilder, InstanceChunkReader,
    StorageClaimCostSplitter,
};

/// Cluster label used when billing runs over the whole account.
const ALL_CLUSTERS: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskletSummary {
    pub clusters: usize,
    pub volume_rows: usize,
    pub rows: usize,
    pub skipped: usize,
}

struct Invocation<'a> {
    account_id: &'a str,
    window: BillingWindow,
    job_type: BatchJobType,
}

struct BilledChunk {
    rows: Vec<(InstanceData, InstanceBillingData)>,
    skipped: usize,
}

/// Bills every instance of an account over one window.
///
/// Persistent volumes are billed first so that the pods mounting their
/// claims can carry a share of their cost in the general pass.
#[derive(TypedBuilder)]
pub struct InstanceBillingDataTasklet {
    instance_data_repo: Arc<dyn InstanceDataRepo>,
    #[builder(default)]
    cluster_registries: Vec<Arc<dyn ClusterRegistry>>,
    cluster_filter_policy: Arc<dyn ClusterFilterPolicy>,
    feature_flag_service: Arc<dyn FeatureFlagService>,
    utilization_service: Arc<dyn UtilizationService>,
    pricing_cache: Arc<dyn PricingCache>,
    billing_export_metadata_service: Arc<dyn BillingExportMetadataService>,
    calculation_service: Arc<dyn BillingCalculationService>,
    parent_attribution_service: Arc<dyn ParentAttributionService>,
    billing_data_writer: BillingDataWriter,
    #[builder(default = 500)]
    chunk_size: usize,
    #[builder(default = 3)]
    stale_running_repair_days: i64,
}

impl InstanceBillingDataTasklet {
    #[tracing::instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn run(
        &self,
        account_id: &str,
        window: BillingWindow,
        job_type: BatchJobType,
    ) -> BillingResult<TaskletSummary> {
        if !window.is_valid() {
            return Err(BillingException::InvalidWindow {
                start: window.start,
                end: window.end,
            });
        }
        let invocation = Invocation {
            account_id,
            window,
            job_type,
        };
        let clusters = self.candidate_clusters(account_id, &window).await?;
        info!("Billing {} cluster scope(s) for {window}", clusters.len());
        let mut summary = TaskletSummary {
            clusters: clusters.len(),
            ..Default::default()
        };

        let mut claims = ClaimIndexBuilder::default();
        for cluster_id in &clusters {
            self.run_volume_pass(&invocation, cluster_id, &mut claims, &mut summary)
                .await?;
        }
        for cluster_id in &clusters {
            self.scan_claim_consumers(&invocation, cluster_id, &mut claims)
                .await?;
        }
        debug!("Indexed {} claimed volumes", claims.volume_count());
        let splitter = claims.build();
        for cluster_id in &clusters {
            self.run_general_pass(&invocation, cluster_id, &splitter, &mut summary)
                .await?;
        }

        info!(
            "Billing finished: {} volume rows, {} rows, {} skipped",
            summary.volume_rows, summary.rows, summary.skipped
        );
        Ok(summary)
    }

    /// `None` stands for the whole account when billing isn't cluster scoped.
    async fn candidate_clusters(
        &self,
        account_id: &str,
        window: &BillingWindow,
    ) -> anyhow::Result<Vec<Option<String>>> {
        if !self
            .feature_flag_service
            .is_enabled(CLUSTER_SCOPED_BILLING, account_id)
            .await?
        {
            return Ok(vec![None]);
        }
        let mut cluster_ids = BTreeSet::new();
        for registry in &self.cluster_registries {
            cluster_ids.extend(registry.get_cluster_ids(account_id).await?);
        }
        let mut candidates = vec![];
        for cluster_id in cluster_ids {
            if self
                .cluster_filter_policy
                .should_bill(account_id, &cluster_id, window)
                .await?
            {
                candidates.push(Some(cluster_id));
            } else {
                debug!("Cluster {cluster_id} filtered out of billing");
            }
        }
        Ok(candidates)
    }

    fn reader(
        &self,
        invocation: &Invocation<'_>,
        cluster_id: &Option<String>,
        instance_types: Vec<InstanceType>,
    ) -> InstanceChunkReader {
        let query = InstanceQuery {
            account_id: invocation.account_id.to_owned(),
            cluster_id: cluster_id.clone(),
            instance_types,
            window: invocation.window,
        };
        InstanceChunkReader::new(self.instance_data_repo.clone(), query, self.chunk_size)
    }

    async fn run_volume_pass(
        &self,
        invocation: &Invocation<'_>,
        cluster_id: &Option<String>,
        claims: &mut ClaimIndexBuilder,
        summary: &mut TaskletSummary,
    ) -> BillingResult<()> {
        let pass = BillingPass::PersistentVolume;
        let mut reader = self.reader(invocation, cluster_id, vec![InstanceType::K8sPv]);
        let mut stale = vec![];
        let mut chunk_index = 0;
        while let Some(chunk) = reader
            .next_chunk()
            .await
            .map_err(|source| chunk_failed(pass, cluster_id, chunk_index, None, source))?
        {
            let first_instance_id = chunk.first().map(|instance| instance.instance_id.clone());
            let billed = async {
                let billed = self.bill_chunk(invocation, chunk, None, &mut stale).await?;
                let rows = billed
                    .rows
                    .iter()
                    .map(|(_, row)| row.clone())
                    .collect::<Vec<_>>();
                self.billing_data_writer
                    .write(&rows, invocation.job_type)
                    .await?;
                anyhow::Ok(billed)
            }
            .await
            .map_err(|source| {
                chunk_failed(pass, cluster_id, chunk_index, first_instance_id.as_deref(), source)
            })?;

            summary.volume_rows += billed.rows.len();
            summary.skipped += billed.skipped;
            for (volume, row) in billed.rows {
                match volume.bound_claim() {
                    Some(claim) => claims.record_volume(claim, volume.usage_start_time, row),
                    None => debug!("Volume {} is not bound to a claim", volume.instance_id),
                }
            }
            chunk_index += 1;
        }
        self.mark_stopped(&stale).await?;
        Ok(())
    }

    async fn scan_claim_consumers(
        &self,
        invocation: &Invocation<'_>,
        cluster_id: &Option<String>,
        claims: &mut ClaimIndexBuilder,
    ) -> BillingResult<()> {
        let pass = BillingPass::ClaimConsumerScan;
        let pod_types = vec![InstanceType::K8sPod, InstanceType::K8sPodFargate];
        let mut reader = self.reader(invocation, cluster_id, pod_types);
        let mut chunk_index = 0;
        while let Some(chunk) = reader
            .next_chunk()
            .await
            .map_err(|source| chunk_failed(pass, cluster_id, chunk_index, None, source))?
        {
            for pod in chunk.iter().filter(|pod| pod.is_valid_for_billing()) {
                for claim in pod.claim_keys() {
                    claims.record_consumer(claim, &pod.instance_id);
                }
            }
            chunk_index += 1;
        }
        Ok(())
    }

    async fn run_general_pass(
        &self,
        invocation: &Invocation<'_>,
        cluster_id: &Option<String>,
        splitter: &StorageClaimCostSplitter,
        summary: &mut TaskletSummary,
    ) -> BillingResult<()> {
        let pass = BillingPass::General;
        let mut reader = self.reader(invocation, cluster_id, InstanceType::general_pass_types());
        let mut stale = vec![];
        let mut chunk_index = 0;
        while let Some(chunk) = reader
            .next_chunk()
            .await
            .map_err(|source| chunk_failed(pass, cluster_id, chunk_index, None, source))?
        {
            let first_instance_id = chunk.first().map(|instance| instance.instance_id.clone());
            let billed = async {
                let billed = self
                    .bill_chunk(invocation, chunk, Some(splitter), &mut stale)
                    .await?;
                let rows = billed
                    .rows
                    .into_iter()
                    .map(|(_, row)| row)
                    .collect::<Vec<_>>();
                self.billing_data_writer
                    .write(&rows, invocation.job_type)
                    .await?;
                anyhow::Ok((rows.len(), billed.skipped))
            }
            .await
            .map_err(|source| {
                chunk_failed(pass, cluster_id, chunk_index, first_instance_id.as_deref(), source)
            })?;

            summary.rows += billed.0;
            summary.skipped += billed.1;
            chunk_index += 1;
        }
        self.mark_stopped(&stale).await?;
        Ok(())
    }

    async fn bill_chunk(
        &self,
        invocation: &Invocation<'_>,
        chunk: Vec<InstanceData>,
        splitter: Option<&StorageClaimCostSplitter>,
        stale: &mut Vec<InstanceData>,
    ) -> anyhow::Result<BilledChunk> {
        let mut instances = Vec::with_capacity(chunk.len());
        let mut skipped = 0;
        for mut instance in chunk {
            self.repair(invocation, &mut instance, stale).await?;
            if instance.is_valid_for_billing() {
                instances.push(instance);
            } else {
                skipped += 1;
            }
        }
        if instances.is_empty() {
            return Ok(BilledChunk {
                rows: vec![],
                skipped,
            });
        }

        let utilization = self.load_utilization(invocation, &instances).await?;
        self.warm_pricing(invocation, &instances).await?;
        let (parent_ids, parent_active_seconds) =
            self.resolve_parents(invocation, &instances).await?;

        let mut rows = Vec::with_capacity(instances.len());
        for (instance, parent_instance_id) in instances.into_iter().zip(parent_ids) {
            let parent_seconds = parent_instance_id.as_ref().and_then(|parent_id| {
                parent_active_seconds
                    .get(&InstanceKey::new(parent_id.clone(), instance.cluster_id.clone()))
                    .copied()
            });
            let instance_utilization = utilization.get(&instance.instance_id);
            let billing = self.calculation_service.compute(
                &instance,
                instance_utilization,
                parent_seconds,
                &invocation.window,
            )?;
            if billing.usage_duration_seconds <= 0.0 {
                debug!(
                    "Instance {} was not active in {}, no row written",
                    instance.instance_id, invocation.window
                );
                skipped += 1;
                continue;
            }
            let claim_share = splitter
                .zip(instance.namespace())
                .filter(|_| !instance.meta_data.claim_names.is_empty())
                .map(|(splitter, namespace)| {
                    splitter.split(namespace, &instance.meta_data.claim_names)
                })
                .filter(|share| !share.is_empty());
            let row = BillingDataWriter::to_row(BillingRecord {
                instance: &instance,
                billing: &billing,
                utilization: instance_utilization,
                parent_instance_id,
                claim_share: claim_share.as_ref(),
                window: &invocation.window,
                job_type: invocation.job_type,
            });
            rows.push((instance, row));
        }
        Ok(BilledChunk { rows, skipped })
    }

    /// Fixes store records billing trips over. Stale running instances are
    /// only collected here; stopping them mid-pass would shift the pages the
    /// reader has yet to fetch.
    async fn repair(
        &self,
        invocation: &Invocation<'_>,
        instance: &mut InstanceData,
        stale: &mut Vec<InstanceData>,
    ) -> anyhow::Result<()> {
        let cutoff = invocation.window.start - Duration::days(self.stale_running_repair_days);
        if instance.is_stale_running(cutoff) {
            warn!(
                "Instance {} still running past its stop time, marking it stopped",
                instance.instance_id
            );
            stale.push(instance.clone());
            instance.state = InstanceState::Stopped;
        }
        if instance.needs_active_iterator() {
            self.instance_data_repo
                .initialize_active_iterator(instance)
                .await?;
        }
        Ok(())
    }

    async fn mark_stopped(&self, stale: &[InstanceData]) -> BillingResult<()> {
        for instance in stale {
            self.instance_data_repo.mark_stopped(instance).await?;
        }
        Ok(())
    }

    async fn load_utilization(
        &self,
        invocation: &Invocation<'_>,
        instances: &[InstanceData],
    ) -> anyhow::Result<HashMap<String, UtilizationData>> {
        let mut groups: BTreeMap<(Option<String>, Option<String>), Vec<InstanceData>> =
            BTreeMap::new();
        for instance in instances {
            groups
                .entry((instance.setting_id.clone(), instance.cluster_id.clone()))
                .or_default()
                .push(instance.clone());
        }
        let mut utilization = HashMap::new();
        for ((setting_id, cluster_id), group) in groups {
            utilization.extend(
                self.utilization_service
                    .get_utilization(
                        &group,
                        &invocation.window,
                        invocation.account_id,
                        setting_id,
                        cluster_id,
                    )
                    .await?,
            );
        }
        Ok(utilization)
    }

    async fn warm_pricing(
        &self,
        invocation: &Invocation<'_>,
        instances: &[InstanceData],
    ) -> anyhow::Result<()> {
        let mut resource_ids: HashMap<CloudProvider, Vec<String>> = HashMap::new();
        for instance in instances {
            if let Some(resource_id) = instance.pricing_resource_id() {
                resource_ids
                    .entry(instance.meta_data.cloud_provider)
                    .or_default()
                    .push(resource_id.to_owned());
            }
        }
        for (provider, ids) in resource_ids {
            let dataset_id = self
                .billing_export_metadata_service
                .get_dataset_id(invocation.account_id, provider)
                .await?;
            self.pricing_cache
                .warm(provider, &ids, &invocation.window, dataset_id)
                .await?;
        }
        Ok(())
    }

    /// Parent id of every instance, in order, and the parents' active seconds.
    async fn resolve_parents(
        &self,
        invocation: &Invocation<'_>,
        instances: &[InstanceData],
    ) -> anyhow::Result<(Vec<Option<String>>, HashMap<InstanceKey, f64>)> {
        let mut parent_ids = Vec::with_capacity(instances.len());
        for instance in instances {
            parent_ids.push(
                self.parent_attribution_service
                    .resolve_parent_id(instance)
                    .await?,
            );
        }
        let mut wanted = parent_ids.iter().flatten().cloned().collect::<Vec<_>>();
        wanted.sort();
        wanted.dedup();
        if wanted.is_empty() {
            return Ok((parent_ids, HashMap::new()));
        }
        let parents = self
            .instance_data_repo
            .get_by_ids(invocation.account_id, &wanted)
            .await?;
        let active_seconds = self
            .parent_attribution_service
            .active_seconds(&parents, &invocation.window);
        Ok((parent_ids, active_seconds))
    }
}

fn chunk_failed(
    pass: BillingPass,
    cluster_id: &Option<String>,
    chunk_index: usize,
    first_instance_id: Option<&str>,
    source: anyhow::Error,
) -> BillingException {
    let cluster_id = cluster_id.as_deref().unwrap_or(ALL_CLUSTERS).to_owned();
    let first_instance_id = first_instance_id.unwrap_or("-").to_owned();
    error!(
        "{pass} pass failed on chunk {chunk_index} of cluster {cluster_id} \
         (first instance: {first_instance_id}): {source:#}"
    );
    BillingException::ChunkFailed {
        pass,
        cluster_id,
        chunk_index,
        first_instance_id,
        source,
    }
}
