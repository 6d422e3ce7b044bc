// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only file sink.
//!
//! Every write lands as one formatted line and is flushed before the global
//! file lock is released, so a reader tailing the file sees complete lines
//! only. The lock spans all `FileSink` instances in the process: two sinks
//! aimed at the same path can never interleave bytes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sluice_core::{LogMessage, LogSink, RetentionCutoffs, SluiceError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::rollover;

/// Placeholder in a destination path, replaced with the current working
/// directory when the target is assigned.
pub const APP_DIR_TOKEN: &str = "_APP_";

const OPEN_RETRIES: u32 = 5;
const OPEN_RETRY_PAUSE: Duration = Duration::from_millis(10);

/// One write lock for every file sink in the process. `write` and `clean_up`
/// both take it; `close` only touches this instance's own handle.
static FILE_LOCK: Mutex<()> = Mutex::const_new(());

/// A [`LogSink`] appending formatted lines to a single file, with size-based
/// rollover handled by [`clean_up`](LogSink::clean_up).
#[derive(Debug, Default)]
pub struct FileSink {
    target: Option<String>,
    file: Option<File>,
}

impl FileSink {
    pub fn new() -> Self {
        FileSink::default()
    }

    async fn open_handle(&mut self, target: &str) -> Result<(), SluiceError> {
        if self.file.is_none() {
            self.file = Some(open_append(Path::new(target)).await?);
        }
        Ok(())
    }
}

#[async_trait]
impl LogSink for FileSink {
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Validates and installs the destination path.
    ///
    /// `_APP_` is substituted with the current working directory here, at
    /// assignment time, and missing leading directories are created eagerly:
    /// walking the components left to right, everything before the first
    /// component containing a `.` is treated as the directory prefix.
    fn set_target(&mut self, target: &str) -> Result<(), SluiceError> {
        if target.trim().is_empty() {
            return Err(SluiceError::InvalidTarget {
                sink: "file",
                reason: "destination path is empty".to_string(),
            });
        }

        let resolved = if target.contains(APP_DIR_TOKEN) {
            let cwd = std::env::current_dir().map_err(SluiceError::io)?;
            target.replace(APP_DIR_TOKEN, &cwd.to_string_lossy())
        } else {
            target.to_string()
        };

        create_leading_dirs(&resolved)?;

        // Retargeting drops any open handle so the next write opens the new
        // path instead of appending to the old one.
        self.file = None;
        self.target = Some(resolved);
        Ok(())
    }

    async fn open(&mut self) -> Result<(), SluiceError> {
        let Some(target) = self.target.clone() else {
            return Err(SluiceError::MissingTarget { sink: "file" });
        };
        self.open_handle(&target).await
    }

    async fn close(&mut self) -> Result<(), SluiceError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(SluiceError::io)?;
        }
        Ok(())
    }

    async fn write(&mut self, message: &LogMessage) -> Result<(), SluiceError> {
        let Some(target) = self.target.clone() else {
            return Err(SluiceError::MissingTarget { sink: "file" });
        };

        let _guard = FILE_LOCK.lock().await;
        self.open_handle(&target).await?;
        if let Some(file) = self.file.as_mut() {
            let line = format!("{}\n", message.format_line());
            file.write_all(line.as_bytes())
                .await
                .map_err(SluiceError::io)?;
            file.flush().await.map_err(SluiceError::io)?;
        }
        Ok(())
    }

    /// Size-based rollover. `cutoffs` is ignored: file retention is bounded
    /// by size and generation count, not by message age.
    async fn clean_up(
        &mut self,
        max_size_kb: u64,
        max_generations: u32,
        _cutoffs: Option<&RetentionCutoffs>,
    ) -> Result<(), SluiceError> {
        let Some(target) = self.target.clone() else {
            return Err(SluiceError::MissingTarget { sink: "file" });
        };

        let _guard = FILE_LOCK.lock().await;
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(SluiceError::io)?;
        }

        let path = Path::new(&target);
        if let Ok(meta) = tokio::fs::metadata(path).await
            && meta.len() as f64 / 1024.0 > max_size_kb as f64
        {
            rollover::roll_over(path, max_generations).await?;
        }

        // The live file is always left freshly opened, whether or not a roll
        // happened and whether or not the path existed before.
        self.file = Some(open_append(path).await?);
        Ok(())
    }
}

/// Open the live file for appending, retrying a handful of times to ride out
/// another process holding an exclusive lock on it.
async fn open_append(path: &Path) -> Result<File, SluiceError> {
    let mut attempt = 0;
    loop {
        match OpenOptions::new().create(true).append(true).open(path).await {
            Ok(file) => return Ok(file),
            Err(_) if attempt < OPEN_RETRIES => {
                attempt += 1;
                warn!(path = %path.display(), attempt, "log file open failed, retrying");
                tokio::time::sleep(OPEN_RETRY_PAUSE).await;
            }
            Err(err) => return Err(SluiceError::io(err)),
        }
    }
}

/// Create the missing directory prefix of a destination path.
///
/// Components are consumed left to right until one contains a `.`; that
/// component and everything after it is taken to be the file name. A
/// directory named `my.dir` therefore ends the walk early, by design of the
/// path convention rather than filesystem inspection.
fn create_leading_dirs(target: &str) -> Result<(), SluiceError> {
    let mut prefix = PathBuf::new();
    for component in Path::new(target).components() {
        if component.as_os_str().to_string_lossy().contains('.') {
            break;
        }
        prefix.push(component);
    }
    if !prefix.as_os_str().is_empty() {
        std::fs::create_dir_all(&prefix).map_err(SluiceError::io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sluice_core::Category;
    use tempfile::tempdir;

    fn fixed_message() -> LogMessage {
        let mut message = LogMessage::new(Category::Information, "svc", "started");
        message.timestamp = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        message
    }

    #[tokio::test]
    async fn operations_without_target_are_usage_errors() {
        let mut sink = FileSink::new();
        assert!(matches!(
            sink.open().await,
            Err(SluiceError::MissingTarget { sink: "file" })
        ));
        assert!(matches!(
            sink.write(&fixed_message()).await,
            Err(SluiceError::MissingTarget { sink: "file" })
        ));
        assert!(matches!(
            sink.clean_up(512, 10, None).await,
            Err(SluiceError::MissingTarget { sink: "file" })
        ));
    }

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let mut sink = FileSink::new();
        assert!(matches!(
            sink.set_target("  "),
            Err(SluiceError::InvalidTarget { sink: "file", .. })
        ));
    }

    #[tokio::test]
    async fn app_token_expands_to_working_directory() {
        let mut sink = FileSink::new();
        sink.set_target("_APP_/Sys.txt").unwrap();
        let cwd = std::env::current_dir().unwrap();
        let expected = format!("{}/Sys.txt", cwd.to_string_lossy());
        assert_eq!(sink.target(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn leading_directories_are_created_at_assignment() {
        // A dot-free tempdir so the component walk reaches the nested dirs.
        let dir = tempfile::Builder::new()
            .prefix("sluicefile")
            .tempdir()
            .unwrap();
        let target = dir.path().join("logs/nested/Sys.txt");

        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        assert!(dir.path().join("logs/nested").is_dir());
        // The file itself is not created until open/write.
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn write_lazily_opens_and_appends_formatted_lines() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        sink.write(&fixed_message()).await.unwrap();
        sink.write(&fixed_message()).await.unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&target).unwrap();
        assert_eq!(
            content,
            "2024/01/01 00:00:00 - Information [svc] started\n\
             2024/01/01 00:00:00 - Information [svc] started\n"
        );
    }

    #[tokio::test]
    async fn writes_are_visible_before_close() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        sink.write(&fixed_message()).await.unwrap();
        let content = std::fs::read_to_string(&target).unwrap();
        assert!(content.ends_with("started\n"));
    }

    #[tokio::test]
    async fn open_and_close_are_idempotent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        sink.close().await.unwrap();
        sink.open().await.unwrap();
        sink.open().await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();
        assert!(target.exists());
    }

    #[tokio::test]
    async fn clean_up_under_threshold_keeps_content() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        sink.write(&fixed_message()).await.unwrap();
        sink.clean_up(1024, 10, None).await.unwrap();

        assert!(!rollover::generation_path(&target, 1).exists());
        let content = std::fs::read_to_string(&target).unwrap();
        assert!(content.contains("started"));

        // The file was reopened; appending still works.
        sink.write(&fixed_message()).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn clean_up_with_zero_threshold_rolls_any_content() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        sink.write(&fixed_message()).await.unwrap();
        sink.clean_up(0, 10, None).await.unwrap();
        sink.close().await.unwrap();

        let rolled = std::fs::read_to_string(rollover::generation_path(&target, 1)).unwrap();
        assert!(rolled.contains("started"));
        // Fresh empty live file left behind.
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "");
    }

    #[tokio::test]
    async fn clean_up_on_missing_file_reopens_fresh() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        sink.clean_up(0, 10, None).await.unwrap();
        assert!(target.exists());
        assert!(!rollover::generation_path(&target, 1).exists());
    }

    #[tokio::test]
    async fn repeated_rolls_respect_the_generation_cap() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Sys.txt");
        let mut sink = FileSink::new();
        sink.set_target(target.to_str().unwrap()).unwrap();

        for _ in 0..5 {
            sink.write(&fixed_message()).await.unwrap();
            sink.clean_up(0, 3, None).await.unwrap();
        }
        sink.close().await.unwrap();

        let mut generations = rollover::list_generations(&target).await.unwrap();
        generations.sort_unstable();
        assert_eq!(generations, vec![1, 2, 3]);
    }
}
