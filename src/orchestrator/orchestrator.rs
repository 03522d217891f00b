use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::{TransferError, TransferResult};
use super::state_machine::UploadStateMachine;
use super::types::{
    ChunkReplication, LogLevel, ReplicationReport, StorageEvent, UploadEvent, UploadState,
};
use crate::chunk::{Chunk, ChunkId, Partitioner};
use crate::config::{RetryPolicy, StorageConfig};
use crate::integrity::IntegrityVerifier;
use crate::metadata::{ChunkRecord, FileRecord, MetadataStore};
use crate::node::ChunkTransport;
use crate::placement::PlacementPlanner;
use crate::registry::{Node, NodeId, NodeRegistry};

/// Drives the upload, download, and delete workflows.
///
/// Every collaborator is an explicit dependency handed in at construction;
/// the orchestrator owns no ambient state beyond its set of in-flight
/// uploads. Chunk transfers run concurrently with bounded parallelism, so
/// one transfer never blocks unrelated ones.
pub struct TransferOrchestrator {
    partitioner: Partitioner,
    planner: PlacementPlanner,
    registry: Arc<NodeRegistry>,
    metadata: Arc<MetadataStore>,
    transport: Arc<dyn ChunkTransport>,
    active_uploads: DashMap<String, UploadStateMachine>,
    retry: RetryPolicy,
    max_concurrent: usize,
    events: Option<mpsc::UnboundedSender<StorageEvent>>,
}

impl TransferOrchestrator {
    pub fn new(
        config: &StorageConfig,
        registry: Arc<NodeRegistry>,
        metadata: Arc<MetadataStore>,
        transport: Arc<dyn ChunkTransport>,
    ) -> TransferResult<Self> {
        Ok(Self {
            partitioner: Partitioner::new(config.chunk_size)?,
            planner: PlacementPlanner::new(config.replication_factor)?,
            registry,
            metadata,
            transport,
            active_uploads: DashMap::new(),
            retry: config.push_retry.clone(),
            max_concurrent: config.max_concurrent_transfers.max(1),
            events: None,
        })
    }

    /// Attach a channel that receives progress and log events.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<StorageEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Upload a file: partition, plan against one registry snapshot, push
    /// every chunk to its replica set, then commit the FileRecord.
    ///
    /// All-or-nothing: on any failure no record is committed, pushed chunks
    /// are removed best-effort, and the error names the reason. Re-uploading
    /// an existing name replaces its record wholesale.
    pub async fn upload(&self, name: &str, data: Bytes) -> TransferResult<FileRecord> {
        let machine = UploadStateMachine::new();
        match self.active_uploads.entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(TransferError::AlreadyInProgress(name.to_string()));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(machine.clone());
            }
        }

        let result = self.run_upload(name, data, &machine).await;

        if let Err(ref error) = result {
            if !machine.current_state().is_terminal() {
                let _ = machine.transition(UploadEvent::Fail {
                    error: error.to_string(),
                });
            }
        }
        self.active_uploads.remove(name);

        result
    }

    async fn run_upload(
        &self,
        name: &str,
        data: Bytes,
        machine: &UploadStateMachine,
    ) -> TransferResult<FileRecord> {
        machine.transition(UploadEvent::Begin)?;
        self.log(
            LogLevel::Info,
            format!("upload {name}: partitioning {} bytes", data.len()),
        );

        let chunks = self.partitioner.partition(&data);
        let chunk_count = chunks.len() as u32;
        machine.transition(UploadEvent::PartitionFinished { chunk_count })?;

        let replication_factor = self.planner.replication_factor() as u32;

        // A 0-byte file is a valid file: commit an empty mapping directly.
        if chunks.is_empty() {
            let record = FileRecord::new(name, 0, replication_factor, Vec::new());
            self.metadata.put(&record).await?;
            machine.transition(UploadEvent::CommitFinished)?;
            self.progress(100.0, format!("upload {name}: complete (empty file)"));
            self.log(LogLevel::Success, format!("upload {name}: committed 0 chunks"));
            return Ok(record);
        }

        // One snapshot for the whole file, so every chunk is planned against
        // a consistent cluster view.
        let online = self.registry.list(true);
        let snapshot: Vec<NodeId> = online.iter().map(|n| n.id).collect();
        let placements = self.planner.plan_file(chunk_count, &snapshot)?;

        if let Some(first) = placements.first() {
            if first.is_degraded() {
                self.log(
                    LogLevel::Info,
                    format!(
                        "upload {name}: replication degraded: requested {}, cluster has {}",
                        first.requested_replicas,
                        first.effective_replicas()
                    ),
                );
            }
        }
        machine.transition(UploadEvent::PlanFinished { chunk_count })?;

        let nodes_by_id: HashMap<NodeId, Node> =
            online.into_iter().map(|n| (n.id, n)).collect();
        let completed = AtomicU32::new(0);

        let mut pushes = stream::iter(chunks.into_iter().zip(placements))
            .map(|(chunk, placement)| {
                let nodes_by_id = &nodes_by_id;
                let completed = &completed;
                async move {
                    // Cooperative cancellation point between chunk pushes.
                    if machine.current_state().is_terminal() {
                        return Err(TransferError::Cancelled);
                    }

                    let chunk_id = ChunkId::new(name, chunk.index);
                    let survivors = self
                        .push_replicas(&chunk_id, &chunk, &placement.node_ids, nodes_by_id)
                        .await;

                    if survivors.is_empty() {
                        return Err(TransferError::PushFailed { index: chunk.index });
                    }

                    // The machine only refuses this transition when the
                    // upload was cancelled while this chunk was in flight.
                    if machine
                        .transition(UploadEvent::ChunkPushed { index: chunk.index })
                        .is_err()
                    {
                        return Err(TransferError::Cancelled);
                    }
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.progress(
                        done as f32 * 100.0 / chunk_count as f32,
                        format!(
                            "upload {name}: chunk {} on {} node(s)",
                            chunk.index,
                            survivors.len()
                        ),
                    );

                    Ok(ChunkRecord {
                        index: chunk.index,
                        hash: chunk.hash,
                        nodes: survivors,
                    })
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut chunk_records = Vec::with_capacity(chunk_count as usize);
        let mut failure = None;
        while let Some(result) = pushes.next().await {
            match result {
                Ok(record) => chunk_records.push(record),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        drop(pushes);

        if let Some(error) = failure {
            self.log(
                LogLevel::Error,
                format!("upload {name} failed: {error}; removing partial chunks"),
            );
            self.cleanup_partial(name, chunk_count, &nodes_by_id).await;
            return Err(error);
        }

        // Transfers complete in any order; the committed mapping is ordered.
        chunk_records.sort_by_key(|r| r.index);

        machine.transition(UploadEvent::AllChunksPushed)?;
        let record = FileRecord::new(name, data.len() as u64, replication_factor, chunk_records);
        self.metadata.put(&record).await?;
        machine.transition(UploadEvent::CommitFinished)?;

        self.progress(100.0, format!("upload {name}: complete"));
        self.log(
            LogLevel::Success,
            format!("upload {name}: committed {chunk_count} chunks"),
        );
        Ok(record)
    }

    /// Push one chunk to every planned node concurrently, returning the ids
    /// that acknowledged, in placement order. A node that keeps failing
    /// after retries is dropped from the chunk's mapping.
    async fn push_replicas(
        &self,
        chunk_id: &ChunkId,
        chunk: &Chunk,
        node_ids: &[NodeId],
        nodes_by_id: &HashMap<NodeId, Node>,
    ) -> Vec<NodeId> {
        let attempts = node_ids.iter().map(|&node_id| async move {
            let node = nodes_by_id.get(&node_id)?;
            match self.push_with_retry(node, chunk_id, chunk.data.clone()).await {
                Ok(()) => Some(node_id),
                Err(error) => {
                    self.log(
                        LogLevel::Error,
                        format!("chunk {chunk_id}: dropping {node}: {error}"),
                    );
                    None
                }
            }
        });

        join_all(attempts).await.into_iter().flatten().collect()
    }

    async fn push_with_retry(
        &self,
        node: &Node,
        chunk_id: &ChunkId,
        data: Bytes,
    ) -> crate::node::NodeResult<()> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.retry.initial_backoff,
            current_interval: self.retry.initial_backoff,
            max_interval: self.retry.max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        };
        let mut attempt = 1;

        loop {
            match self.transport.put(node, chunk_id, data.clone()).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt < self.retry.max_attempts => {
                    let wait = backoff
                        .next_backoff()
                        .unwrap_or(self.retry.max_backoff);
                    tracing::warn!(
                        "push of {} to {} failed (attempt {}/{}): {}; retrying in {:?}",
                        chunk_id,
                        node,
                        attempt,
                        self.retry.max_attempts,
                        error,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Best-effort removal of whatever a failed upload managed to push.
    async fn cleanup_partial(
        &self,
        name: &str,
        chunk_count: u32,
        nodes_by_id: &HashMap<NodeId, Node>,
    ) {
        for index in 0..chunk_count {
            let chunk_id = ChunkId::new(name, index);
            for node in nodes_by_id.values() {
                if let Err(error) = self.transport.delete(node, &chunk_id).await {
                    tracing::warn!("cleanup of {} on {} failed: {}", chunk_id, node, error);
                }
            }
        }
    }

    /// Cancel an in-flight upload. The worker notices between chunk pushes
    /// and fails the upload without committing a record.
    pub fn cancel_upload(&self, name: &str) -> TransferResult<()> {
        let machine = self
            .active_uploads
            .get(name)
            .ok_or_else(|| TransferError::FileNotFound(name.to_string()))?;
        machine.transition(UploadEvent::Cancel)?;
        self.log(LogLevel::Info, format!("upload {name}: cancel requested"));
        Ok(())
    }

    /// State of an in-flight upload, if one exists for this name.
    pub fn upload_state(&self, name: &str) -> Option<UploadState> {
        self.active_uploads.get(name).map(|sm| sm.current_state())
    }

    /// Download a file: fetch every chunk in index order, verifying each
    /// against its recorded digest and falling back across replicas.
    pub async fn download(&self, name: &str) -> TransferResult<Bytes> {
        let record = self
            .metadata
            .get(name)
            .await?
            .ok_or_else(|| TransferError::FileNotFound(name.to_string()))?;

        self.log(
            LogLevel::Info,
            format!("download {name}: {} chunks", record.chunk_count),
        );

        if record.chunk_count == 0 {
            self.progress(100.0, format!("download {name}: complete (empty file)"));
            return Ok(Bytes::new());
        }

        let total = record.chunk_count;
        let completed = AtomicU32::new(0);

        let chunks: Vec<Chunk> = stream::iter(record.chunks.iter())
            .map(|chunk_record| {
                let completed = &completed;
                async move {
                    let data = self.fetch_chunk(name, chunk_record).await?;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.progress(
                        done as f32 * 100.0 / total as f32,
                        format!("download {name}: {done}/{total} chunks"),
                    );
                    Ok::<Chunk, TransferError>(Chunk {
                        index: chunk_record.index,
                        data,
                        hash: chunk_record.hash,
                    })
                }
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        let bytes = Partitioner::reassemble(chunks)?;
        if bytes.len() as u64 != record.size {
            tracing::warn!(
                "download {}: reassembled {} bytes, record says {}",
                name,
                bytes.len(),
                record.size
            );
        }

        self.log(
            LogLevel::Success,
            format!("download {name}: reassembled {} bytes", bytes.len()),
        );
        Ok(bytes)
    }

    /// Try each replica of a chunk in recorded order, skipping deregistered
    /// or offline nodes. A corrupt replica is logged and the next one tried.
    async fn fetch_chunk(&self, file: &str, record: &ChunkRecord) -> TransferResult<Bytes> {
        let chunk_id = ChunkId::new(file, record.index);

        for &node_id in &record.nodes {
            let Some(node) = self.registry.get(node_id) else {
                tracing::warn!("chunk {}: node {} no longer registered", chunk_id, node_id);
                continue;
            };
            if !node.status.is_online() {
                continue;
            }

            match self.transport.get(&node, &chunk_id).await {
                Ok(data) => match IntegrityVerifier::verify(&data, &record.hash) {
                    Ok(()) => return Ok(data),
                    Err(error) => {
                        self.log(
                            LogLevel::Error,
                            format!("chunk {chunk_id}: corrupt replica on {node}: {error}"),
                        );
                    }
                },
                Err(error) => {
                    self.log(
                        LogLevel::Error,
                        format!("chunk {chunk_id}: {node} unavailable: {error}"),
                    );
                }
            }
        }

        Err(TransferError::ChunkUnavailable {
            index: record.index,
        })
    }

    /// Delete a file. Removing the FileRecord is the authoritative "file is
    /// gone" signal; node-side removals are best-effort and failures are
    /// logged, never propagated.
    pub async fn delete(&self, name: &str) -> TransferResult<()> {
        let record = self
            .metadata
            .get(name)
            .await?
            .ok_or_else(|| TransferError::FileNotFound(name.to_string()))?;

        self.metadata.delete(name).await?;

        for chunk_record in &record.chunks {
            let chunk_id = ChunkId::new(name, chunk_record.index);
            for &node_id in &chunk_record.nodes {
                let Some(node) = self.registry.get(node_id) else {
                    continue;
                };
                if let Err(error) = self.transport.delete(&node, &chunk_id).await {
                    self.log(
                        LogLevel::Error,
                        format!("delete of {chunk_id} on {node} failed: {error}"),
                    );
                }
            }
        }

        self.log(LogLevel::Success, format!("deleted {name}"));
        Ok(())
    }

    /// Per-chunk assigned vs live replica counts for one file.
    pub async fn replication_report(&self, name: &str) -> TransferResult<ReplicationReport> {
        let record = self
            .metadata
            .get(name)
            .await?
            .ok_or_else(|| TransferError::FileNotFound(name.to_string()))?;

        let chunks = record
            .chunks
            .iter()
            .map(|chunk_record| {
                let live = chunk_record
                    .nodes
                    .iter()
                    .filter(|&&id| {
                        self.registry
                            .get(id)
                            .map(|n| n.status.is_online())
                            .unwrap_or(false)
                    })
                    .count();
                ChunkReplication {
                    index: chunk_record.index,
                    assigned: chunk_record.nodes.len(),
                    live,
                }
            })
            .collect();

        Ok(ReplicationReport {
            name: record.name,
            replication_factor: record.replication_factor,
            chunks,
        })
    }

    /// Read-only view of all FileRecords, for rendering.
    pub async fn list_files(&self) -> TransferResult<Vec<FileRecord>> {
        Ok(self.metadata.list().await?)
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    fn progress(&self, percent: f32, message: impl Into<String>) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(StorageEvent::Progress {
                percent,
                message: message.into(),
            });
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => tracing::warn!("{message}"),
            _ => tracing::info!("{message}"),
        }
        if let Some(ref tx) = self.events {
            let _ = tx.send(StorageEvent::Log {
                level,
                message,
                timestamp: chrono::Utc::now().timestamp(),
            });
        }
    }
}
