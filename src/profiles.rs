//! 用户资料注册表：JSON 文件持久化，按字段合并头像与背景图。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::atomic::AtomicFile;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub background: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// 可单独更新的图片字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileField {
    ProfileImage,
    Background,
}

#[derive(Debug)]
pub enum ProfileError {
    Encode(serde_json::Error),
    Io(io::Error),
}

impl From<io::Error> for ProfileError {
    fn from(err: io::Error) -> Self {
        ProfileError::Io(err)
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        ProfileError::Encode(err)
    }
}

/// 所有写操作在同一把锁内完成“读取-合并-整体写回”，避免并发写丢失更新。
#[derive(Debug)]
pub struct ProfileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProfileRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list_all(&self) -> Vec<Profile> {
        load_profiles(&self.path).await
    }

    pub async fn upsert_profile_image(
        &self,
        name: &str,
        image_url: &str,
    ) -> Result<Profile, ProfileError> {
        self.upsert(name, ProfileField::ProfileImage, image_url, Utc::now())
            .await
    }

    pub async fn upsert_background(
        &self,
        name: &str,
        image_url: &str,
    ) -> Result<Profile, ProfileError> {
        self.upsert(name, ProfileField::Background, image_url, Utc::now())
            .await
    }

    /// 合并单个图片字段；不存在同名记录时追加新记录。
    async fn upsert(
        &self,
        name: &str,
        field: ProfileField,
        image_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Profile, ProfileError> {
        let _guard = self.write_lock.lock().await;
        let mut profiles = load_profiles(&self.path).await;

        let index = match profiles.iter().position(|profile| profile.name == name) {
            Some(index) => index,
            None => {
                profiles.push(Profile {
                    name: name.to_string(),
                    profile_image: None,
                    background: None,
                    updated_at: now,
                });
                profiles.len() - 1
            }
        };
        let profile = &mut profiles[index];
        match field {
            ProfileField::ProfileImage => profile.profile_image = Some(image_url.to_string()),
            ProfileField::Background => profile.background = Some(image_url.to_string()),
        }
        profile.updated_at = now;
        let merged = profile.clone();

        persist_profiles(&self.path, &profiles).await?;
        info!(name, field = ?field, total = profiles.len(), "profile updated");
        Ok(merged)
    }
}

/// 读取失败或内容损坏时按空集合处理。
async fn load_profiles(path: &Path) -> Vec<Profile> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(path = ?path, error = %err, "profile store unreadable, using empty set");
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(profiles) => profiles,
        Err(err) => {
            warn!(path = ?path, error = %err, "profile store malformed, using empty set");
            Vec::new()
        }
    }
}

async fn persist_profiles(path: &Path, profiles: &[Profile]) -> Result<(), ProfileError> {
    let content = serde_json::to_vec_pretty(profiles)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut atomic = AtomicFile::new(path).await?;
    if let Err(err) = atomic.file_mut().write_all(&content).await {
        atomic.cleanup().await;
        return Err(err.into());
    }
    atomic.finalize().await?;
    Ok(())
}
