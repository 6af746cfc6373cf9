//! 列表与清空接口：stories、posts、profiles。

use axum::extract::Extension;
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::posts::PostCollection;
use crate::profiles::{Profile, ProfileRegistry};
use crate::record::UploadRecord;
use crate::stories::StoryCollection;

#[derive(Serialize)]
pub struct ClearResponse {
    success: bool,
    message: &'static str,
}

/// 返回仍在有效期内的 story（同时丢弃过期项）。
pub async fn list_stories(
    Extension(stories): Extension<Arc<StoryCollection>>,
) -> JsonResponse<Vec<UploadRecord>> {
    JsonResponse(stories.list_active().await)
}

pub async fn clear_stories(
    Extension(stories): Extension<Arc<StoryCollection>>,
) -> JsonResponse<ClearResponse> {
    let removed = stories.clear_all().await;
    info!(removed, "stories cleared");
    JsonResponse(ClearResponse {
        success: true,
        message: "All stories deleted.",
    })
}

pub async fn list_posts(
    Extension(posts): Extension<Arc<PostCollection>>,
) -> JsonResponse<Vec<UploadRecord>> {
    JsonResponse(posts.list_all().await)
}

pub async fn clear_posts(
    Extension(posts): Extension<Arc<PostCollection>>,
) -> JsonResponse<ClearResponse> {
    let removed = posts.clear_all().await;
    info!(removed, "posts cleared");
    JsonResponse(ClearResponse {
        success: true,
        message: "All posts deleted.",
    })
}

pub async fn list_profiles(
    Extension(profiles): Extension<Arc<ProfileRegistry>>,
) -> JsonResponse<Vec<Profile>> {
    JsonResponse(profiles.list_all().await)
}
