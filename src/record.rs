//! 上传记录模型（story 与 post 共用）及单调 id 生成。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::blob::StoredBlob;
use crate::config::DEFAULT_USER;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub user: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub caption: Option<String>,
}

/// 基于毫秒时钟的单调 id：同一毫秒内的第二个 id 顺延一位。
#[derive(Debug, Default)]
pub struct RecordIds {
    last: AtomicI64,
}

impl RecordIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> String {
        let candidate = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or(candidate);
        candidate.max(previous + 1).to_string()
    }
}

impl UploadRecord {
    /// 由已落盘文件和表单字段组装记录。
    pub fn from_blob(
        ids: &RecordIds,
        blob: StoredBlob,
        user: Option<String>,
        caption: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ids.next_at(created_at),
            url: blob.url,
            created_at,
            user: normalize_user(user),
            mime_type: blob.content_type,
            caption: caption.filter(|value| !value.trim().is_empty()),
        }
    }
}

/// 空白或缺省用户名回退为 "Anonymous"。
pub fn normalize_user(user: Option<String>) -> String {
    user.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_USER.to_string())
}

#[cfg(test)]
pub(crate) fn sample(user: &str, created_at: DateTime<Utc>) -> UploadRecord {
    UploadRecord {
        id: created_at.timestamp_millis().to_string(),
        url: format!("http://localhost:5000/uploads/{user}.png"),
        created_at,
        user: user.to_string(),
        mime_type: "image/png".to_string(),
        caption: None,
    }
}
