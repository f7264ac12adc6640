use anyhow::{Context, Result};
use clap::Parser;
use class_portal::{
    api::{self, AppState},
    config::{BlobBackend, Config},
};
use class_portal_core::{
    auth::{Hs256Verifier, TokenIssuer},
    blob::{BlobStorage, LocalBlobStorage, S3BlobStorage},
    storage::ClassStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("class_portal=info,tower_http=info")),
        )
        .init();

    let config = Config::parse();

    let store = ClassStore::new(&config.store_dir)?;
    info!(
        classes = store.classes().len(),
        dir = %config.store_dir.display(),
        "class store loaded"
    );

    let blobs: Arc<dyn BlobStorage> = match config.blob_backend {
        BlobBackend::Local => Arc::new(LocalBlobStorage::new(&config.upload_dir)?),
        BlobBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .context("--s3-bucket is required for the s3 backend")?;
            let s3_config = aws_config::load_from_env().await;
            Arc::new(S3BlobStorage {
                client: aws_sdk_s3::Client::new(&s3_config),
                bucket,
            })
        }
    };

    let state = AppState {
        store: Arc::new(RwLock::new(store)),
        blobs,
        issuer: Arc::new(TokenIssuer::new(config.credentials(), &config.jwt_secret)),
        verifier: Arc::new(Hs256Verifier::new(&config.jwt_secret)),
        public_base_url: config.base_url(),
        max_upload_bytes: config.max_upload_bytes,
        expose_errors: !config.production,
    };
    let app = api::router(state);

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, backend = ?config.blob_backend, "listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
