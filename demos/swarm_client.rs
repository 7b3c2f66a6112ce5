use std::{sync::Arc, time::Duration};

use serde_json::json;
use tower_a2a_swarm::{
    client::{init_logging, LoggingConfig, SwarmOptions},
    prelude::*,
    protocol::Consistency,
};

// Configuration - update these to match your swarm
const SWARM_URL: &str = "https://your-swarm-url";
const API_KEY: &str = "your-api-key";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::default());

    println!("🚀 Tower-A2A Swarm Client Example\n");

    // The directory is normally fed from the swarm registry
    let directory = Arc::new(InMemoryDirectory::new([
        AgentDirectoryEntry::new("coordinator-1", AgentRole::Coordinator),
        AgentDirectoryEntry::new("memory-1", AgentRole::MemoryManager).with_load(0.2),
        AgentDirectoryEntry::new("memory-2", AgentRole::MemoryManager).with_load(0.4),
        AgentDirectoryEntry::new("memory-3", AgentRole::MemoryManager).with_load(0.1),
        AgentDirectoryEntry::new("analyst-1", AgentRole::Analyst)
            .with_capabilities(["github", "code_quality"]),
    ]));

    let client = A2AClientBuilder::new(SWARM_URL.parse()?)
        .with_api_key(API_KEY)
        .with_timeout(Duration::from_secs(30))
        .with_directory(directory)
        .build()?;

    if let Err(e) = client.connect().await {
        eprintln!(
            r#"✗ Failed to connect: {e}

    Note: Make sure SWARM_URL points to a running A2A coordination service"#
        );
        return Ok(());
    }
    println!("✓ Connected over {:?}\n", client.active_channel().await);

    // Step 1: Bring the swarm up
    println!("🐝 Initializing swarm...");
    match client.initialize_swarm(&SwarmOptions::default()).await {
        Ok(response) => println!("✓ Swarm ready: {:?}\n", response.result),
        Err(e) => eprintln!("✗ [{}] {e}\n", e.code()),
    }

    // Step 2: Replicated write, then a strong read
    println!("💾 Storing memory...");
    match client
        .store_memory("deploy/target", json!({"region": "eu-west-1"}), "ops", None, 3)
        .await
    {
        Ok(response) => println!("✓ Stored: {:?}", response.result),
        Err(e) => eprintln!("✗ [{}] {e}", e.code()),
    }
    match client
        .retrieve_memory("deploy/target", "ops", Consistency::Strong)
        .await
    {
        Ok(response) => println!("✓ Retrieved: {:?}\n", response.result),
        Err(e) => eprintln!("✗ [{}] {e}\n", e.code()),
    }

    // Step 3: A hand-built pipeline
    println!("🔧 Running a two-stage pipeline...");
    let message = A2AMessage::builder()
        .target(AgentTarget::group(AgentRole::Analyst))
        .tool(tools::GITHUB_REPO_ANALYZE)
        .coordination(CoordinationMode::pipeline(
            vec![
                PipelineStage::new("scan").parameters(json!({"repo": "octo/repo"})),
                PipelineStage::new("report")
                    .target(AgentTarget::group(AgentRole::Coordinator))
                    .tool(tools::PERFORMANCE_REPORT)
                    .input_transform("summarize"),
            ],
            FailureStrategy::Skip,
            true,
        ))
        .parameters(json!({}))
        .build()?;

    match client.send(message).await {
        Ok(response) => println!("✓ Pipeline finished: {:?}", response.result),
        Err(e) => eprintln!("✗ [{}] {e}", e.code()),
    }

    client.disconnect().await;
    println!("\n👋 Disconnected");
    Ok(())
}
