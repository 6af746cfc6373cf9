//! 持久动态（post）集合：无过期，仅支持整体清空。

use tokio::sync::Mutex;

use crate::record::UploadRecord;

#[derive(Debug, Default)]
pub struct PostCollection {
    records: Mutex<Vec<UploadRecord>>,
}

impl PostCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: UploadRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn list_all(&self) -> Vec<UploadRecord> {
        self.records.lock().await.clone()
    }

    pub async fn clear_all(&self) -> usize {
        let mut records = self.records.lock().await;
        let removed = records.len();
        records.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample;
    use chrono::{TimeDelta, TimeZone, Utc};

    #[tokio::test]
    async fn posts_never_expire_and_keep_order() {
        let posts = PostCollection::new();
        let long_ago = Utc.timestamp_millis_opt(0).unwrap();
        posts.append(sample("first", long_ago)).await;
        posts
            .append(sample("second", long_ago + TimeDelta::days(30)))
            .await;

        let all = posts.list_all().await;
        let users: Vec<_> = all.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, ["first", "second"]);
    }

    #[tokio::test]
    async fn clear_all_removes_everything() {
        let posts = PostCollection::new();
        posts.append(sample("a", Utc::now())).await;
        assert_eq!(posts.clear_all().await, 1);
        assert!(posts.list_all().await.is_empty());
    }
}
