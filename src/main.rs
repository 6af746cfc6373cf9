//! Media Drop server binary.
//!
//! A small media-sharing backend: uploads are written to disk and tracked as
//! expiring stories, persistent posts, or per-user profile images. The main
//! entry point builds the stores, assembles the Axum router and starts the
//! HTTP (and optional HTTPS) listeners.

mod app;
mod atomic;
mod background;
mod blob;
mod config;
mod error;
mod feeds;
mod http;
mod logging;
mod posts;
mod profiles;
mod record;
mod stories;
mod tls;
mod upload;
mod version;

use axum_server::Handle;
use chrono::TimeDelta;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::app::{AppContext, build_router};
use crate::background::spawn_background_tasks;
use crate::blob::BlobStore;
use crate::config::Args;
use crate::http::build_cors_layer;
use crate::posts::PostCollection;
use crate::profiles::ProfileRegistry;
use crate::record::RecordIds;
use crate::stories::StoryCollection;

shadow!(build);

/// Starts the Media Drop server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let story_ttl = i64::try_from(args.story_ttl_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "story ttl out of range")
        })?;
    let blobs = Arc::new(BlobStore::new(
        PathBuf::from(&args.upload_dir),
        args.public_base_url(),
        args.media_filter,
    ));
    blobs.ensure_root().await?;
    let context = AppContext {
        blobs: blobs.clone(),
        stories: Arc::new(StoryCollection::new(story_ttl)),
        posts: Arc::new(PostCollection::new()),
        profiles: Arc::new(ProfileRegistry::new(PathBuf::from(&args.profiles_file))),
        ids: Arc::new(RecordIds::new()),
    };
    info!(
        upload_dir = ?blobs.root_path(),
        profiles_file = ?context.profiles.path(),
        media_filter = args.media_filter,
        story_ttl_secs = args.story_ttl_secs,
        "stores ready"
    );

    let mut app = build_router(context, args.upload_max_size);
    if let Some(cors_layer) = build_cors_layer(&args.cors_origins) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    spawn_background_tasks(blobs, Duration::from_secs(args.temp_ttl_secs));

    info!("Starting HTTP server at {}", http_addr);
    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(app.clone().into_make_service_with_connect_info::<SocketAddr>());

    match args.https_port {
        Some(https_port) => {
            let https_addr = SocketAddr::new(host, https_port);
            let tls_config = tls::build_rustls_config(&args, host).await?;
            info!("Starting HTTPS server at {}", https_addr);
            let https_server = axum_server::bind_rustls(https_addr, tls_config)
                .handle(handle.clone())
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());
            tokio::select! {
                result = http_server => result?,
                result = https_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
        None => {
            tokio::select! {
                result = http_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
