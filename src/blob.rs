//! 上传文件落盘：生成唯一存储名、MIME 过滤与公开 URL。

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::atomic::{AtomicFile, TEMP_PREFIX};
use crate::config::UPLOADS_ROUTE;

const FALLBACK_BASE_NAME: &str = "file";

#[derive(Debug)]
pub enum BlobError {
    UnsupportedMediaType(String),
    Io(io::Error),
}

impl From<io::Error> for BlobError {
    fn from(err: io::Error) -> Self {
        BlobError::Io(err)
    }
}

/// 已写入磁盘的文件信息。
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub file_name: String,
    pub url: String,
    pub content_type: String,
}

#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
    public_base: String,
    media_filter: bool,
    sequence: AtomicU64,
}

impl BlobStore {
    pub fn new(root: PathBuf, public_base: impl Into<String>, media_filter: bool) -> Self {
        Self {
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
            media_filter,
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 校验 MIME 并写入文件，返回可公开访问的 URL。
    pub async fn store(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
        now: DateTime<Utc>,
    ) -> Result<StoredBlob, BlobError> {
        let original_name = original_name.unwrap_or_default();
        let content_type = resolve_content_type(original_name, content_type);
        if self.media_filter && !is_media_type(&content_type) {
            return Err(BlobError::UnsupportedMediaType(content_type));
        }

        let file_name = self.storage_name(original_name, now);
        let target = self.root.join(&file_name);
        let mut atomic = AtomicFile::new(&target).await?;
        if let Err(err) = atomic.file_mut().write_all(bytes).await {
            atomic.cleanup().await;
            return Err(err.into());
        }
        atomic.finalize_new().await?;

        let url = format!("{}{}/{}", self.public_base, UPLOADS_ROUTE, file_name);
        info!(file_name, content_type, bytes = bytes.len(), "blob stored");
        Ok(StoredBlob {
            file_name,
            url,
            content_type,
        })
    }

    /// 时间戳 + 单调序号 + 随机串 + 清洗后的原始文件名。
    fn storage_name(&self, original_name: &str, now: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let token = Uuid::new_v4().simple().to_string();
        let (base, ext) = sanitize_file_name(original_name);
        let mut name = format!(
            "{}-{seq}-{}-{base}",
            now.timestamp_millis(),
            &token[..8]
        );
        if let Some(ext) = ext {
            name.push('.');
            name.push_str(&ext);
        }
        name
    }

    /// 清理超过 ttl 的残留临时文件。
    pub async fn cleanup_stale_temp(&self, ttl: Duration) -> io::Result<usize> {
        if ttl.is_zero() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let mut removed = 0;
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = match metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
            {
                Some(value) => value,
                None => continue,
            };
            if age >= ttl {
                let path = entry.path();
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!(path = ?path, "removed stale temp file");
                        removed += 1;
                    }
                    Err(err) => warn!(path = ?path, error = %err, "failed to remove stale temp file"),
                }
            }
        }

        Ok(removed)
    }
}

/// 判断 MIME 是否为 image/* 或 video/*。
pub fn is_media_type(content_type: &str) -> bool {
    let essence = content_type.trim().to_ascii_lowercase();
    essence.starts_with("image/") || essence.starts_with("video/")
}

fn resolve_content_type(original_name: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => mime_guess::from_path(original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// 拆分并清洗文件名：主名只保留 `[A-Za-z0-9_-]`，扩展名只保留字母数字。
pub fn sanitize_file_name(original: &str) -> (String, Option<String>) {
    let leaf = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let (stem, ext) = match leaf.rfind('.') {
        Some(index) if index > 0 => (&leaf[..index], Some(&leaf[index + 1..])),
        _ => (leaf, None),
    };

    let base: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let base = if base.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        base
    };
    let ext = ext
        .map(|value| {
            value
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
        })
        .filter(|value| !value.is_empty());

    (base, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_store(filter: bool) -> (tempfile::TempDir, BlobStore) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("uploads");
        std::fs::create_dir_all(&root).expect("create upload root");
        (temp, BlobStore::new(root, "http://localhost:5000/", filter))
    }

    #[test]
    fn sanitize_strips_unsafe_characters_and_keeps_extension() {
        assert_eq!(
            sanitize_file_name("my cat (1).png"),
            ("mycat1".to_string(), Some("png".to_string()))
        );
        assert_eq!(
            sanitize_file_name("../../etc/passwd"),
            ("passwd".to_string(), None)
        );
        assert_eq!(
            sanitize_file_name("archive.tar.gz"),
            ("archivetar".to_string(), Some("gz".to_string()))
        );
        assert_eq!(
            sanitize_file_name("фото.JPG"),
            ("file".to_string(), Some("JPG".to_string()))
        );
        assert_eq!(
            sanitize_file_name(".hidden"),
            ("hidden".to_string(), None)
        );
    }

    #[test]
    fn media_filter_accepts_only_image_and_video() {
        assert!(is_media_type("image/png"));
        assert!(is_media_type("Video/MP4"));
        assert!(!is_media_type("application/pdf"));
        assert!(!is_media_type("text/plain"));
    }

    #[tokio::test]
    async fn store_writes_file_and_builds_url() {
        let (_temp, store) = make_store(true);
        let blob = store
            .store(Some("cat.png"), Some("image/png"), b"png-bytes", Utc::now())
            .await
            .expect("store blob");

        assert!(blob.file_name.ends_with("-cat.png"));
        assert_eq!(
            blob.url,
            format!("http://localhost:5000/uploads/{}", blob.file_name)
        );
        assert_eq!(blob.content_type, "image/png");
        let contents = std::fs::read(store.root_path().join(&blob.file_name)).expect("read blob");
        assert_eq!(contents, b"png-bytes");
    }

    #[tokio::test]
    async fn storage_name_uses_the_given_timestamp() {
        let (_temp, store) = make_store(true);
        let now = chrono::TimeZone::timestamp_millis_opt(&Utc, 1_700_000_000_123).unwrap();
        let blob = store
            .store(Some("cat.png"), Some("image/png"), b"png", now)
            .await
            .expect("store blob");
        assert!(blob.file_name.starts_with("1700000000123-"));
    }

    #[tokio::test]
    async fn same_original_name_never_collides() {
        let (_temp, store) = make_store(true);
        let first = store
            .store(Some("a.jpg"), Some("image/jpeg"), b"1", Utc::now())
            .await
            .expect("first");
        let second = store
            .store(Some("a.jpg"), Some("image/jpeg"), b"2", Utc::now())
            .await
            .expect("second");
        assert_ne!(first.file_name, second.file_name);
    }

    #[tokio::test]
    async fn rejected_type_writes_nothing() {
        let (_temp, store) = make_store(true);
        let result = store
            .store(Some("doc.pdf"), Some("application/pdf"), b"%PDF", Utc::now())
            .await;
        assert!(matches!(result, Err(BlobError::UnsupportedMediaType(ref mime)) if mime == "application/pdf"));
        let entries = std::fs::read_dir(store.root_path()).expect("read dir").count();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn filter_disabled_accepts_any_type() {
        let (_temp, store) = make_store(false);
        let blob = store
            .store(Some("doc.pdf"), Some("application/pdf"), b"%PDF", Utc::now())
            .await
            .expect("store pdf");
        assert_eq!(blob.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn missing_content_type_is_guessed_from_name() {
        let (_temp, store) = make_store(true);
        let blob = store
            .store(Some("clip.mp4"), None, b"mp4", Utc::now())
            .await
            .expect("store clip");
        assert_eq!(blob.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn cleanup_removes_only_temp_files() {
        let (_temp, store) = make_store(true);
        let kept = store.root_path().join("1-0-abc-kept.png");
        let stale = store.root_path().join(format!("{TEMP_PREFIX}dead.png"));
        std::fs::write(&kept, b"k").expect("write kept");
        std::fs::write(&stale, b"s").expect("write stale");

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = store
            .cleanup_stale_temp(Duration::from_millis(1))
            .await
            .expect("cleanup");

        assert_eq!(removed, 1);
        assert!(kept.exists());
        assert!(!stale.exists());
    }
}
