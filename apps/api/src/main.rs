mod blob;
mod book;
mod cache;
mod config;
mod db;
mod entity;
mod errors;
mod keyword;
mod llm_client;
mod queue;
mod retry;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod timezone;
mod tts;
mod workflow;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::blob::s3::S3BlobStore;
use crate::book::feed::HttpFeedSource;
use crate::book::oai_pmh::OaiPmhClient;
use crate::book::urls::REPOSITORY;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::entity::documents::PgDocumentStore;
use crate::llm_client::LlmClient;
use crate::queue::RedisTaskQueue;
use crate::retry::RetryPolicy;
use crate::routes::build_router;
use crate::state::AppState;
use crate::tts::GoogleTts;
use crate::workflow::{Collaborators, WorkflowSettings, Workflows};

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

    info!("Starting shelfcast API v{}", env!("CARGO_PKG_VERSION"));

    // Refuse to start with a gap in any migration chain
    entity::validate_all_chains().context("Entity migration chains are incomplete")?;

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized (queue: {})", config.task_queue_key);

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), RetryPolicy::GENERATION);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let collaborators = Collaborators {
        documents: Arc::new(PgDocumentStore::new(db)),
        blobs: Arc::new(S3BlobStore::new(
            s3,
            config.s3_bucket.clone(),
            config.s3_endpoint.clone(),
        )),
        feeds: Arc::new(HttpFeedSource::new(RetryPolicy::REMOTE_FETCH)),
        bibliography: Arc::new(OaiPmhClient::new(
            config.oai_pmh_base_url.clone(),
            RetryPolicy::REMOTE_FETCH,
        )),
        queue: Arc::new(RedisTaskQueue::new(
            redis,
            config.task_queue_key.clone(),
            RetryPolicy::ENQUEUE,
        )),
        llm: Arc::new(llm),
        tts: Arc::new(GoogleTts::new(config.tts_api_key.clone(), RetryPolicy::GENERATION)),
    };

    let settings = WorkflowSettings {
        feed_base_url: config.feed_base_url.clone(),
        repository: REPOSITORY.to_string(),
        book_max_age_days: config.book_cache_max_age_days,
        auto_migrate: config.auto_migrate,
    };
    info!(
        "Book records refresh after {} days, auto-migrate {}",
        settings.book_max_age_days,
        if settings.auto_migrate { "on" } else { "off" }
    );

    // Build app state
    let state = AppState {
        workflows: Arc::new(Workflows::new(collaborators, settings)),
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
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "shelfcast-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by subdomain.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
