//! DetectAI HTTP server.
//!
//! Serves `POST /detect` over a multi-threaded tokio runtime. The model
//! bundle loads lazily on the first accepted request, or at startup with
//! `--preload`.

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use detectai_inference::{DetectionPipeline, ModelPaths, ModelRegistry};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "detectai-server")]
#[command(about = "Detect AI-generated code over HTTP", long_about = None)]
struct Cli {
    /// Directory holding the encoder export (tokenizer.json, config.json,
    /// model.safetensors)
    #[arg(long, env = "DETECTAI_ENCODER_DIR", default_value = "models/codebert-base")]
    encoder_dir: PathBuf,

    /// Path to the ONNX classifier artifact
    #[arg(
        long,
        env = "DETECTAI_CLASSIFIER",
        default_value = "models/human_ai_classifier.onnx"
    )]
    classifier: PathBuf,

    /// Address to bind
    #[arg(long, env = "DETECTAI_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "DETECTAI_PORT", default_value_t = 5000)]
    port: u16,

    /// Load the model bundle at startup instead of on the first request
    #[arg(long)]
    preload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let registry = Arc::new(ModelRegistry::new(ModelPaths {
        encoder_dir: cli.encoder_dir,
        classifier: cli.classifier,
    }));

    if cli.preload {
        let registry = Arc::clone(&registry);
        tokio::task::spawn_blocking(move || registry.ensure_loaded()).await??;
    }

    let pipeline = Arc::new(DetectionPipeline::new(registry));
    let app = routes::router(pipeline);

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    info!("listening on http://{}:{}", cli.host, cli.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
