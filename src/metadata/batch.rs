//! Batched metadata lookups
//!
//! Ids are requested in fixed-size chunks. A chunk that keeps failing is
//! retried up to `batch_attempts` times and then requested one id at a time,
//! so a single bad id cannot lose the metadata of its whole chunk. A quota
//! error aborts immediately.

use crate::config::MetadataConfig;
use crate::metadata::{ChannelMetadata, MetadataError, MetadataService, VideoMetadata};
use crate::node::NodeId;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Batching front end for a `MetadataService`
#[derive(Clone)]
pub struct MetadataFetcher {
    service: Arc<dyn MetadataService>,
    video_batch_size: usize,
    channel_batch_size: usize,
    batch_attempts: u32,
}

impl MetadataFetcher {
    pub fn new(service: Arc<dyn MetadataService>, config: &MetadataConfig) -> Self {
        Self {
            service,
            video_batch_size: config.video_batch_size.max(1),
            channel_batch_size: config.channel_batch_size.max(1),
            batch_attempts: config.batch_attempts.max(1),
        }
    }

    /// The underlying service
    pub fn service(&self) -> &Arc<dyn MetadataService> {
        &self.service
    }

    /// Fetches metadata for every video in `video_ids`
    ///
    /// Unknown or unavailable videos are missing from the result.
    ///
    /// # Returns
    ///
    /// * `Ok(HashMap)` - Metadata keyed by video id
    /// * `Err(MetadataError::QuotaExceeded)` - The service stopped answering
    pub async fn fetch_videos(
        &self,
        video_ids: &[NodeId],
    ) -> Result<HashMap<NodeId, VideoMetadata>, MetadataError> {
        let service = Arc::clone(&self.service);
        self.fetch_batched(video_ids, self.video_batch_size, "video", |batch| {
            let service = Arc::clone(&service);
            async move { service.video_batch(&batch).await }
        })
        .await
    }

    /// Fetches metadata for every channel in `channel_ids`
    pub async fn fetch_channels(
        &self,
        channel_ids: &[String],
    ) -> Result<HashMap<String, ChannelMetadata>, MetadataError> {
        let service = Arc::clone(&self.service);
        self.fetch_batched(channel_ids, self.channel_batch_size, "channel", |batch| {
            let service = Arc::clone(&service);
            async move { service.channel_batch(&batch).await }
        })
        .await
    }

    async fn fetch_batched<K, V, F, Fut>(
        &self,
        ids: &[K],
        batch_size: usize,
        kind: &str,
        mut request: F,
    ) -> Result<HashMap<K, V>, MetadataError>
    where
        K: Clone + Eq + Hash + Display,
        F: FnMut(Vec<K>) -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>, MetadataError>>,
    {
        let mut result = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(batch_size) {
            let mut fetched = false;

            for attempt in 1..=self.batch_attempts {
                match request(chunk.to_vec()).await {
                    Ok(found) => {
                        result.extend(found);
                        fetched = true;
                        break;
                    }
                    Err(MetadataError::QuotaExceeded) => return Err(MetadataError::QuotaExceeded),
                    Err(e) => {
                        tracing::debug!(
                            "{} batch of {} failed (attempt {}/{}): {}",
                            kind,
                            chunk.len(),
                            attempt,
                            self.batch_attempts,
                            e
                        );
                    }
                }
            }

            if fetched {
                continue;
            }

            tracing::warn!(
                "{} batch of {} kept failing; requesting ids individually",
                kind,
                chunk.len()
            );
            for id in chunk {
                match request(vec![id.clone()]).await {
                    Ok(found) => result.extend(found),
                    Err(MetadataError::QuotaExceeded) => return Err(MetadataError::QuotaExceeded),
                    Err(e) => tracing::warn!("Skipping {} metadata for {}: {}", kind, id, e),
                }
            }
        }

        Ok(result)
    }
}
