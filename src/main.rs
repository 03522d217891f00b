use std::sync::Arc;

use bytes::Bytes;
use shardstore::orchestrator::StorageEvent;
use shardstore::{
    LocalCluster, MetadataStore, Node, NodeRegistry, NodeSeed, StorageConfig, TransferOrchestrator,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("shardstore - Distributed Chunk Storage Core");
    println!("===========================================\n");

    let config = StorageConfig {
        chunk_size: 64 * 1024,
        replication_factor: 2,
        initial_nodes: (1..=3u64)
            .map(|id| NodeSeed {
                id,
                host: "127.0.0.1".into(),
                port: 9000 + id as u16,
            })
            .collect(),
        ..Default::default()
    };
    config.validate()?;

    // In-process cluster standing in for the real storage-node service.
    let cluster = Arc::new(LocalCluster::new());
    let registry = Arc::new(NodeRegistry::new());
    for seed in &config.initial_nodes {
        cluster.add_node(seed.id);
        registry.register(Node::new(seed.id, seed.host.clone(), seed.port))?;
    }
    println!("✓ Registered {} storage nodes", registry.len());

    let metadata = Arc::new(MetadataStore::new_in_memory().await?);
    println!("✓ Metadata store: in-memory SQLite");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let orchestrator = Arc::new(
        TransferOrchestrator::new(&config, registry.clone(), metadata, cluster.clone())?
            .with_events(events_tx),
    );
    println!(
        "✓ Orchestrator: {} KB chunks, replication factor {}\n",
        config.chunk_size / 1024,
        config.replication_factor
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                StorageEvent::Progress { percent, message } => {
                    println!("  [{percent:5.1}%] {message}");
                }
                StorageEvent::Log { level, message, .. } => {
                    println!("  [{level:?}] {message}");
                }
            }
        }
    });

    // Upload a sample payload and walk the full lifecycle.
    let payload: Vec<u8> = (0..200 * 1024).map(|i| (i % 256) as u8).collect();
    let record = orchestrator
        .upload("sample.bin", Bytes::from(payload.clone()))
        .await?;
    println!(
        "\n✓ Uploaded sample.bin: {} bytes in {} chunks",
        record.size, record.chunk_count
    );
    for chunk in &record.chunks {
        println!(
            "    chunk {} -> nodes {:?} ({})",
            chunk.index, chunk.nodes, chunk.hash
        );
    }

    let downloaded = orchestrator.download("sample.bin").await?;
    assert_eq!(&downloaded[..], &payload[..]);
    println!("\n✓ Downloaded and verified {} bytes", downloaded.len());

    let report = orchestrator.replication_report("sample.bin").await?;
    println!(
        "✓ Replication report: {} chunks, fully replicated: {}",
        report.chunks.len(),
        report.is_fully_replicated()
    );

    orchestrator.delete("sample.bin").await?;
    println!("✓ Deleted sample.bin");

    drop(orchestrator);
    printer.await?;

    Ok(())
}
