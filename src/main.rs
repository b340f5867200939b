//! Debate orchestration core entrypoint.
//!
//! Each process runs one agent role against the shared bus:
//!
//! ```bash
//! debate-core --role moderator
//! debate-core --role arbiter
//! debate-core --role refiner
//! ```
//!
//! The three roles are expected to run as separate processes sharing a
//! real external bus; this binary wires them against the in-process
//! `InMemoryBus` for local development and demonstration, since the
//! durable external bus is out of scope (see the message bus adapter).

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use debate_core::agent::{ArbiterRole, ModeratorRole, RefinerRole};
use debate_core::arbitration::ArbitrationEngine;
use debate_core::embedding::StubEmbeddingProvider;
use debate_core::model_client::{AuthStyle, HttpModelClient};
use debate_core::stream::{ObserverStream, StreamAdapter};
use debate_core::{AgentRuntime, Config, InMemoryBus};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Moderator,
    Arbiter,
    Refiner,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which agent role this process runs.
    #[arg(long, value_enum)]
    role: RoleArg,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Arc::new(Config::from_env());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    if !config.heartbeat_sane() {
        anyhow::bail!(
            "HEARTBEAT_EXPIRY ({:?}) must be greater than HEARTBEAT_INTERVAL ({:?})",
            config.heartbeat_expiry,
            config.heartbeat_interval
        );
    }

    let bus = InMemoryBus::shared();
    let embeddings = Arc::new(StubEmbeddingProvider);

    // Inability to open the observer stream at startup is fatal: an agent
    // with no channel to report its debate activity has nothing to do.
    let stream = ObserverStream::Live(Box::new(StreamAdapter::connect(&config.ws_uri).await?));

    match args.role {
        RoleArg::Moderator => {
            let role = ModeratorRole::new(&config, embeddings);
            let runtime = Arc::new(AgentRuntime::new(role, bus, config, stream));
            runtime.run().await;
        }
        RoleArg::Arbiter => {
            let engine = Arc::new(ArbitrationEngine::new(&config));
            let role = ArbiterRole::new(engine, embeddings);
            let runtime = Arc::new(AgentRuntime::new(role, bus, config, stream));
            runtime.run().await;
        }
        RoleArg::Refiner => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
            let client = Arc::new(HttpModelClient::new(
                config.api_url.clone(),
                api_key,
                AuthStyle::Bearer,
            ));
            let cache =
                debate_core::cache::ResponseCache::new(bus.clone(), config.caching_enabled, config.cache_ttl);
            let role = RefinerRole::new(client, cache);
            let runtime = Arc::new(AgentRuntime::new(role, bus, config, stream));
            runtime.run().await;
        }
    }

    Ok(())
}
