use std::sync::Arc;

use domain_billing::{
    model::entity::InstanceData,
    repository::{InstanceDataRepo, InstanceQuery},
};

/// Pages through the instance store lazily.
///
/// The sweep ends after the first page shorter than the chunk size, which
/// may be empty. A new reader over the same query starts from the top.
pub struct InstanceChunkReader {
    instance_data_repo: Arc<dyn InstanceDataRepo>,
    query: InstanceQuery,
    chunk_size: usize,
    offset: usize,
    exhausted: bool,
}

impl InstanceChunkReader {
    pub fn new(
        instance_data_repo: Arc<dyn InstanceDataRepo>,
        query: InstanceQuery,
        chunk_size: usize,
    ) -> Self {
        Self {
            instance_data_repo,
            query,
            chunk_size: chunk_size.max(1),
            offset: 0,
            exhausted: false,
        }
    }

    pub async fn next_chunk(&mut self) -> anyhow::Result<Option<Vec<InstanceData>>> {
        if self.exhausted {
            return Ok(None);
        }
        let chunk = self
            .instance_data_repo
            .get_active_instances(&self.query, self.offset, self.chunk_size)
            .await?;
        self.offset += chunk.len();
        self.exhausted = chunk.len() < self.chunk_size;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use domain_billing::{
        mock::MockInstanceDataRepo,
        model::vo::{BillingWindow, InstanceType},
    };

    use super::*;

    fn query() -> InstanceQuery {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        InstanceQuery {
            account_id: "account".to_string(),
            cluster_id: None,
            instance_types: vec![InstanceType::K8sPod],
            window: BillingWindow::new(start, start + Duration::days(1)),
        }
    }

    fn repo_with(total: usize) -> MockInstanceDataRepo {
        let mut repo = MockInstanceDataRepo::new();
        repo.expect_get_active_instances()
            .returning(move |_, offset, limit| {
                Ok((offset..total.min(offset + limit))
                    .map(|i| InstanceData {
                        instance_id: format!("pod-{i}"),
                        ..Default::default()
                    })
                    .collect())
            });
        repo
    }

    async fn chunk_sizes(reader: &mut InstanceChunkReader) -> Vec<usize> {
        let mut sizes = vec![];
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }
        sizes
    }

    #[tokio::test]
    async fn stops_after_short_chunk() {
        let mut reader = InstanceChunkReader::new(Arc::new(repo_with(5)), query(), 2);

        assert_eq!(chunk_sizes(&mut reader).await, vec![2, 2, 1]);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_empty_chunk() {
        let mut reader = InstanceChunkReader::new(Arc::new(repo_with(4)), query(), 2);

        assert_eq!(chunk_sizes(&mut reader).await, vec![2, 2, 0]);
    }

    #[tokio::test]
    async fn chunks_are_contiguous() {
        let mut reader = InstanceChunkReader::new(Arc::new(repo_with(3)), query(), 2);

        let first = reader.next_chunk().await.unwrap().unwrap();
        let second = reader.next_chunk().await.unwrap().unwrap();

        assert_eq!(first[1].instance_id, "pod-1");
        assert_eq!(second[0].instance_id, "pod-2");
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let mut repo = MockInstanceDataRepo::new();
        repo.expect_get_active_instances()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));
        let mut reader = InstanceChunkReader::new(Arc::new(repo), query(), 2);

        assert!(reader.next_chunk().await.is_err());
    }
}
