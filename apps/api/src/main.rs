mod archive;
mod config;
mod db;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod pipeline;
mod rating;
mod routes;
mod sessions;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::archive::{RunArchive, S3RunArchive};
use crate::config::{Config, S3Config};
use crate::db::create_pool;
use crate::extraction::PdfExtractor;
use crate::llm_client::LlmClient;
use crate::pipeline::RetryPolicy;
use crate::rating::{build_resume_pipeline, RunCoordinator, StageSettings};
use crate::routes::build_router;
use crate::sessions::{MemorySessionStore, PgSessionStore, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Recruiter API v{}", env!("CARGO_PKG_VERSION"));

    // Session store: PostgreSQL when configured, otherwise in-process
    let sessions: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            Arc::new(PgSessionStore::new(pool, config.app_name.clone()))
        }
        None => {
            warn!("DATABASE_URL not set, sessions are kept in memory only");
            Arc::new(MemorySessionStore::new())
        }
    };

    // Run archive: S3 / MinIO when configured
    let archive: Option<Arc<dyn RunArchive>> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("S3 client initialized (bucket: {})", s3.bucket);
            Some(Arc::new(S3RunArchive::new(client, s3.bucket.clone())))
        }
        None => {
            info!("S3_BUCKET not set, run snapshots will not be archived");
            None
        }
    };

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let settings = StageSettings {
        timeout: config.stage_timeout,
        retry: RetryPolicy {
            max_attempts: config.stage_max_attempts,
            backoff: config.stage_retry_backoff,
        },
    };
    let pipeline = build_resume_pipeline(llm, settings)?;
    info!(
        "Pipeline '{}' ready ({} steps, stage timeout {}s)",
        pipeline.name(),
        pipeline.steps().len(),
        config.stage_timeout.as_secs()
    );

    // Build app state
    let state = AppState {
        coordinator: Arc::new(RunCoordinator::new(pipeline, sessions.clone(), archive)),
        sessions,
        extractor: Arc::new(PdfExtractor),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "recruiter-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
