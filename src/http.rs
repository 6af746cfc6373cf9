//! HTTP 辅助工具：CORS、安全头与客户端 IP 解析。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::middleware;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::UPLOADS_ROUTE;

/// 构建 CORS Layer：`*` 允许任意来源，否则为逗号分隔的来源列表。
pub fn build_cors_layer(cors_origins: &str) -> Option<CorsLayer> {
    let cors_origins = cors_origins.trim();
    if cors_origins == "*" {
        return Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let origins = cors_origins
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// 从 `x-forwarded-for` 取第一个客户端地址。
pub fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// 上传目录下以 `.` 开头的条目（写入中的临时文件）不对外提供。
pub async fn hide_dot_uploads(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    if is_hidden_upload_path(request.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

fn is_hidden_upload_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(UPLOADS_ROUTE) else {
        return false;
    };
    rest.split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase();
        segment.starts_with('.') || segment.starts_with("%2e")
    })
}

/// 添加基础安全响应头。
pub async fn add_security_headers(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, StatusCode> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}
