//! 临时写入与原子落盘的辅助方法。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use uuid::Uuid;

/// 临时文件名前缀，后台清理任务依此识别残留文件。
pub const TEMP_PREFIX: &str = ".tmp.";

/// 可用于原子落盘的临时文件封装。
pub struct AtomicFile {
    target: PathBuf,
    temp_path: PathBuf,
    file: File,
}

impl AtomicFile {
    /// 在目标路径同目录创建临时文件。
    pub async fn new(target: &Path) -> io::Result<Self> {
        let parent = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid target path"))?;
        let base = target
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| "file".into());
        let temp_name = format!("{TEMP_PREFIX}{}.{base}", Uuid::new_v4().simple());
        let temp_path = parent.join(temp_name);
        let file = File::create(&temp_path).await?;
        Ok(Self {
            target: target.to_path_buf(),
            temp_path,
            file,
        })
    }

    /// 返回临时文件的可写句柄。
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// 放弃并清理临时文件。
    pub async fn cleanup(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }

    /// 同步并替换目标文件（允许覆盖）。
    pub async fn finalize(self) -> io::Result<()> {
        self.commit(true).await
    }

    /// 同步并落盘为新文件；目标已存在时放弃并返回 AlreadyExists。
    pub async fn finalize_new(self) -> io::Result<()> {
        self.commit(false).await
    }

    async fn commit(self, overwrite: bool) -> io::Result<()> {
        if let Err(err) = self.file.sync_all().await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(err);
        }
        drop(self.file);

        if !overwrite && fs::try_exists(&self.target).await.unwrap_or(false) {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", self.target.display()),
            ));
        }

        if let Err(err) = fs::rename(&self.temp_path, &self.target).await {
            #[cfg(windows)]
            {
                if overwrite && fs::remove_file(&self.target).await.is_ok() {
                    fs::rename(&self.temp_path, &self.target).await?;
                } else {
                    let _ = fs::remove_file(&self.temp_path).await;
                    return Err(err);
                }
            }
            #[cfg(not(windows))]
            {
                let _ = fs::remove_file(&self.temp_path).await;
                return Err(err);
            }
        }

        if let Some(parent) = self.target.parent() {
            let _ = sync_dir(parent).await;
        }

        Ok(())
    }
}

#[cfg(unix)]
async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AtomicFile;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn finalize_new_refuses_existing_target() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("taken.bin");
        std::fs::write(&target, b"old").expect("seed target");

        let mut atomic = AtomicFile::new(&target).await.expect("create temp");
        atomic.file_mut().write_all(b"new").await.expect("write");
        let result = atomic.finalize_new().await;

        assert_eq!(
            result.expect_err("should refuse").kind(),
            std::io::ErrorKind::AlreadyExists
        );
        assert_eq!(std::fs::read(&target).expect("read"), b"old");
        let leftovers = std::fs::read_dir(temp.path()).expect("read dir").count();
        assert_eq!(leftovers, 1, "temp file should be removed");
    }

    #[tokio::test]
    async fn finalize_replaces_existing_target() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("set.json");
        std::fs::write(&target, b"[]").expect("seed target");

        let mut atomic = AtomicFile::new(&target).await.expect("create temp");
        atomic.file_mut().write_all(b"[1]").await.expect("write");
        atomic.finalize().await.expect("finalize");

        assert_eq!(std::fs::read(&target).expect("read"), b"[1]");
    }
}
