//! 后台任务：清理上传目录中遗留的临时文件。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::config::TEMP_CLEAN_INTERVAL_SECS;

/// 启动临时文件清理任务；ttl 为 0 时不启动。
pub fn spawn_background_tasks(blobs: Arc<BlobStore>, temp_ttl: Duration) {
    if temp_ttl.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TEMP_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match blobs.cleanup_stale_temp(temp_ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "removed stale upload temp files"),
                Err(err) => warn!(error = %err, "upload temp cleanup failed"),
            }
        }
    });
}
