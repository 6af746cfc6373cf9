//! 上传处理器：解析 multipart 表单，落盘后写入 story / post / profile。

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Extension, Multipart};
use axum::response::Json as JsonResponse;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::blob::{BlobStore, StoredBlob};
use crate::error::ApiError;
use crate::posts::PostCollection;
use crate::profiles::{Profile, ProfileRegistry};
use crate::record::{RecordIds, UploadRecord, normalize_user};
use crate::stories::StoryCollection;

const FILE_FIELD: &str = "file";

/// multipart 中的文件部分。
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// 解析后的上传表单：一个文件与若干文本字段。
#[derive(Default)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            // 只有带 filename 的 `file` 部分才算附件，同名的普通文本字段不算。
            if name == FILE_FIELD && field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.file = Some(FilePart {
                    file_name,
                    content_type,
                    bytes,
                });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// 读取文本字段，空白视为缺省。
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.text(name)
            .map(|value| {
                matches!(
                    value.to_ascii_lowercase().as_str(),
                    "true" | "1" | "yes" | "on"
                )
            })
            .unwrap_or(false)
    }

    /// 先写文件再返回；没有文件时报 MissingFile。
    async fn store_file(
        &mut self,
        blobs: &BlobStore,
        now: DateTime<Utc>,
    ) -> Result<StoredBlob, ApiError> {
        let file = self.file.take().ok_or(ApiError::MissingFile)?;
        let blob = blobs
            .store(
                file.file_name.as_deref(),
                file.content_type.as_deref(),
                &file.bytes,
                now,
            )
            .await?;
        debug!(file_name = blob.file_name, "file part stored");
        Ok(blob)
    }
}

/// 上传 story。
pub async fn upload_story(
    Extension(blobs): Extension<Arc<BlobStore>>,
    Extension(stories): Extension<Arc<StoryCollection>>,
    Extension(ids): Extension<Arc<RecordIds>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadRecord>, ApiError> {
    let mut form = UploadForm::from_multipart(multipart?).await?;
    let now = Utc::now();
    let blob = form.store_file(&blobs, now).await?;
    let record = UploadRecord::from_blob(&ids, blob, form.text("user"), None, now);
    stories.append(record.clone()).await;
    info!(id = record.id, user = record.user, url = record.url, "story uploaded");
    Ok(JsonResponse(record))
}

/// 上传 post；说明文字取 caption，缺省时取 text。
pub async fn upload_post(
    Extension(blobs): Extension<Arc<BlobStore>>,
    Extension(posts): Extension<Arc<PostCollection>>,
    Extension(ids): Extension<Arc<RecordIds>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadRecord>, ApiError> {
    let mut form = UploadForm::from_multipart(multipart?).await?;
    let now = Utc::now();
    let blob = form.store_file(&blobs, now).await?;
    let caption = form.text("caption").or_else(|| form.text("text"));
    let record = UploadRecord::from_blob(&ids, blob, form.text("user"), caption, now);
    posts.append(record.clone()).await;
    info!(id = record.id, user = record.user, url = record.url, "post uploaded");
    Ok(JsonResponse(record))
}

/// 上传头像或背景图，合并进对应用户的资料。
pub async fn upload_profile(
    Extension(blobs): Extension<Arc<BlobStore>>,
    Extension(profiles): Extension<Arc<ProfileRegistry>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<Profile>, ApiError> {
    let mut form = UploadForm::from_multipart(multipart?).await?;
    let blob = form.store_file(&blobs, Utc::now()).await?;
    let name = normalize_user(form.text("name"));
    let profile = if form.flag("background") {
        profiles.upsert_background(&name, &blob.url).await?
    } else {
        profiles.upsert_profile_image(&name, &blob.url).await?
    };
    Ok(JsonResponse(profile))
}
