mod applications;
mod billing;
mod config;
mod db;
mod errors;
mod jobs;
mod models;
mod queue;
mod routes;
mod state;
mod storage;
mod store;
mod users;
mod webhooks;

#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::applications::orchestrator::Orchestrator;
use crate::billing::SubscriptionBilling;
use crate::config::Config;
use crate::db::create_pool;
use crate::queue::sqs::SqsDispatcher;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3UrlSigner;
use crate::store::postgres::PgStore;
use crate::users::linkedin::LinkedinProfiles;
use crate::webhooks::callbacks::CallbackUrls;

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

    info!("Starting ApplyFlow API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(db.clone()));

    // Initialize AWS clients (LocalStack / MinIO when AWS_ENDPOINT is set)
    let aws = load_aws_config(&config).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws)
        .force_path_style(config.aws.endpoint.is_some())
        .build();
    let s3 = aws_sdk_s3::Client::from_conf(s3_config);
    let sqs = aws_sdk_sqs::Client::new(&aws);
    info!("AWS clients initialized (region: {})", config.aws.region);

    let dispatcher = Arc::new(SqsDispatcher::new(sqs, &config.queues));
    let billing = Arc::new(SubscriptionBilling::new(
        db,
        store.clone(),
        dispatcher.clone(),
        config.free_generation_allowance,
    ));
    let signer = Arc::new(S3UrlSigner::new(
        s3,
        config.aws.resource_bucket.clone(),
        config.signed_url_ttl,
    ));
    let callbacks = CallbackUrls::new(&config.base_url)?;
    info!("Worker callbacks will target {}", config.base_url);

    let orchestrator = Orchestrator {
        applications: store.clone(),
        jobs: store.clone(),
        users: store.clone(),
        dispatcher: dispatcher.clone(),
        entitlement: billing.clone(),
        meter: billing.clone(),
        callbacks: callbacks.clone(),
        documents_ready_template: config.documents_ready_template.clone(),
    };
    let linkedin = LinkedinProfiles {
        users: store.clone(),
        dispatcher,
        entitlement: billing,
        callbacks,
    };

    // Build app state
    let state = AppState {
        orchestrator,
        linkedin,
        applications: store.clone(),
        jobs: store.clone(),
        subscriptions: store,
        signer,
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

/// Shared AWS configuration with static credentials and an optional endpoint override.
async fn load_aws_config(config: &Config) -> SdkConfig {
    let credentials = Credentials::new(
        &config.aws.access_key_id,
        &config.aws.secret_access_key,
        None,
        None,
        "applyflow-static",
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.aws.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}
