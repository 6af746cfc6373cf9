//! 路由装配：把各存储对象作为 Extension 注入处理器。

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::blob::BlobStore;
use crate::config::UPLOADS_ROUTE;
use crate::http::{add_security_headers, forwarded_client, hide_dot_uploads};
use crate::posts::PostCollection;
use crate::profiles::ProfileRegistry;
use crate::record::RecordIds;
use crate::stories::StoryCollection;
use crate::{feeds, upload, version};

/// 进程内唯一的一组存储对象。
#[derive(Clone)]
pub struct AppContext {
    pub blobs: Arc<BlobStore>,
    pub stories: Arc<StoryCollection>,
    pub posts: Arc<PostCollection>,
    pub profiles: Arc<ProfileRegistry>,
    pub ids: Arc<RecordIds>,
}

pub fn build_router(context: AppContext, upload_max_size: usize) -> Router {
    let uploads = ServeDir::new(context.blobs.root_path());

    Router::new()
        .route("/upload", post(upload::upload_story))
        .route(
            "/stories",
            get(feeds::list_stories).delete(feeds::clear_stories),
        )
        .route("/post", post(upload::upload_post))
        .route("/posts", get(feeds::list_posts).delete(feeds::clear_posts))
        .route("/upload-profile", post(upload::upload_profile))
        .route("/profiles", get(feeds::list_profiles))
        .route("/health", get(version::health))
        .route("/version", get(version::get_version_info))
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(DefaultBodyLimit::max(upload_max_size))
        .layer(middleware::from_fn(hide_dot_uploads))
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip().to_string());
                    let client_ip = forwarded_client(request.headers())
                        .or(connect_ip)
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(context.blobs))
        .layer(Extension(context.stories))
        .layer(Extension(context.posts))
        .layer(Extension(context.profiles))
        .layer(Extension(context.ids))
}
