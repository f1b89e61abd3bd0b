//! Report pipeline server binary
//!
//! Run with: cargo run -p report-pipeline --bin report-pipeline-server

use report_pipeline::{config::PipelineConfig, server::PipelineServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_pipeline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                  Quarterly Report Pipeline                ║
║        PDF -> Markdown -> Chunks -> Vectors -> Answers     ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // REPORT_CONFIG points at a TOML file; environment overrides apply on top
    let config = PipelineConfig::load(None)?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Storage: {:?} ({})", config.storage.backend, config.storage.root.display());
    tracing::info!("  - Airflow: {} (dag {})", config.workflow.base_url, config.workflow.dag_id);
    tracing::info!("  - Embeddings: {:?} ({} dims)", config.embeddings.provider, config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    let server = PipelineServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  GET  /api/years                 - Years with reports");
    println!("  POST /api/pipeline/trigger      - Run the conversion DAG");
    println!("  POST /api/convert/:parser       - Convert a report in-process");
    println!("  POST /api/chunks                - Chunk converted markdown");
    println!("  POST /api/index/:backend/query  - Ask questions");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
