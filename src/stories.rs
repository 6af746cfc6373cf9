//! 限时动态（story）集合：读取时按存活时间惰性清理。

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::record::UploadRecord;

#[derive(Debug)]
pub struct StoryCollection {
    ttl: TimeDelta,
    records: Mutex<Vec<UploadRecord>>,
}

impl StoryCollection {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn append(&self, record: UploadRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn list_active(&self) -> Vec<UploadRecord> {
        self.list_active_at(Utc::now()).await
    }

    /// 丢弃 `now - created_at >= ttl` 的记录并写回，返回剩余记录（保持插入顺序）。
    pub async fn list_active_at(&self, now: DateTime<Utc>) -> Vec<UploadRecord> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| now.signed_duration_since(record.created_at) < self.ttl);
        let expired = before - records.len();
        if expired > 0 {
            debug!(expired, remaining = records.len(), "stories expired");
        }
        records.clone()
    }

    /// 清空全部 story，返回删除数量。
    pub async fn clear_all(&self) -> usize {
        let mut records = self.records.lock().await;
        let removed = records.len();
        records.clear();
        removed
    }

    #[cfg(test)]
    async fn stored_len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample;
    use chrono::TimeZone;

    fn twelve_hours() -> TimeDelta {
        TimeDelta::hours(12)
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[tokio::test]
    async fn story_survives_until_just_before_ttl() {
        let stories = StoryCollection::new(twelve_hours());
        stories.append(sample("Bob", t0())).await;

        let just_before = t0() + twelve_hours() - TimeDelta::milliseconds(1);
        assert_eq!(stories.list_active_at(just_before).await.len(), 1);
    }

    #[tokio::test]
    async fn story_expires_exactly_at_ttl() {
        let stories = StoryCollection::new(twelve_hours());
        stories.append(sample("Bob", t0())).await;

        assert!(stories.list_active_at(t0() + twelve_hours()).await.is_empty());
    }

    #[tokio::test]
    async fn expiry_is_destructive() {
        let stories = StoryCollection::new(twelve_hours());
        stories.append(sample("old", t0())).await;
        stories
            .append(sample("new", t0() + TimeDelta::hours(6)))
            .await;

        let later = t0() + TimeDelta::hours(13);
        let active = stories.list_active_at(later).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user, "new");
        assert_eq!(stories.stored_len().await, 1);

        // Moving the clock back does not restore the dropped record.
        assert_eq!(stories.list_active_at(t0()).await.len(), 1);
    }

    #[tokio::test]
    async fn list_active_is_idempotent() {
        let stories = StoryCollection::new(twelve_hours());
        stories.append(sample("a", t0())).await;
        stories.append(sample("b", t0() + TimeDelta::hours(1))).await;
        stories.append(sample("c", t0() + TimeDelta::hours(2))).await;

        let now = t0() + TimeDelta::minutes(12 * 60 + 30);
        let first = stories.list_active_at(now).await;
        let second = stories.list_active_at(now).await;
        assert_eq!(first, second);
        let users: Vec<_> = first.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, ["b", "c"]);
    }

    #[tokio::test]
    async fn future_dated_story_is_retained() {
        let stories = StoryCollection::new(twelve_hours());
        stories
            .append(sample("skewed", t0() + TimeDelta::minutes(5)))
            .await;
        assert_eq!(stories.list_active_at(t0()).await.len(), 1);
    }

    #[tokio::test]
    async fn clear_all_empties_collection() {
        let stories = StoryCollection::new(twelve_hours());
        stories.append(sample("a", t0())).await;
        stories.append(sample("b", t0())).await;

        assert_eq!(stories.clear_all().await, 2);
        assert!(stories.list_active_at(t0()).await.is_empty());
    }
}
