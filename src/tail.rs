//! Follows a growing log file
//!
//! Emits complete lines as they are appended. The file is polled at EOF;
//! truncation restarts reading at the beginning. A replaced file (log
//! rotation) is read to its end and then reopened at the same path.

use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::TailConfig;
use crate::error::{MonitorError, MonitorResult};

/// Identity of the underlying file, used to detect rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
fn file_id(meta: &Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

#[cfg(not(unix))]
fn file_id(_meta: &Metadata) -> Option<FileId> {
    None
}

pub struct LogTail {
    path: PathBuf,
    config: TailConfig,
    reader: BufReader<File>,
    offset: u64,
    identity: Option<FileId>,
    /// Bytes of a line whose newline has not been written yet
    pending: Vec<u8>,
    /// The path now names a different file; finish the current one first
    rotated: bool,
}

fn finish_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

impl LogTail {
    /// Opens the log source. Failure here is fatal for the monitor.
    pub async fn open(path: impl AsRef<Path>, config: TailConfig) -> MonitorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| MonitorError::log_source(&path, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| MonitorError::log_source(&path, e))?;

        let mut reader = BufReader::new(file);
        let offset = if config.from_start {
            0
        } else {
            reader.seek(SeekFrom::End(0)).await?
        };

        info!(
            path = %path.display(),
            offset = offset,
            "Following log file"
        );

        Ok(Self {
            path,
            config,
            reader,
            offset,
            identity: file_id(&meta),
            pending: Vec::new(),
            rotated: false,
        })
    }

    /// Reads the next complete line, or `None` when no complete line is
    /// available yet. Trailing `\r\n` is stripped and invalid UTF-8 is
    /// replaced.
    ///
    /// After a rotation the old file is read to its end before switching to
    /// the new one; an unterminated last line of the old file is delivered
    /// as is.
    pub async fn read_line(&mut self) -> MonitorResult<Option<String>> {
        loop {
            let n = self.reader.read_until(b'\n', &mut self.pending).await?;
            if n == 0 {
                if !self.rotated {
                    return Ok(None);
                }

                self.reopen().await?;
                let rest = std::mem::take(&mut self.pending);
                if !rest.is_empty() {
                    return Ok(Some(finish_line(rest)));
                }
                continue;
            }
            self.offset += n as u64;

            if self.pending.last() == Some(&b'\n') {
                return Ok(Some(finish_line(std::mem::take(&mut self.pending))));
            }
        }
    }

    /// Checks for truncation or rotation after reaching EOF
    async fn follow(&mut self) -> MonitorResult<()> {
        if self.rotated {
            return Ok(());
        }

        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Log file missing, waiting for it to reappear");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if file_id(&meta) != self.identity {
            info!(path = %self.path.display(), "Log file replaced, draining old file before reopening");
            self.rotated = true;
        } else if meta.len() < self.offset {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                len = meta.len(),
                "Log file truncated, reading from start"
            );
            self.reader.seek(SeekFrom::Start(0)).await?;
            self.offset = 0;
            self.pending.clear();
        }

        Ok(())
    }

    /// Switches to the file now at `path`. Leaves `pending` to the caller.
    async fn reopen(&mut self) -> MonitorResult<()> {
        let file = File::open(&self.path).await?;
        let meta = file.metadata().await?;
        self.reader = BufReader::new(file);
        self.identity = file_id(&meta);
        self.offset = 0;
        self.rotated = false;
        Ok(())
    }

    /// Sends every line to `lines` until the receiver is dropped. I/O
    /// errors after startup are logged and retried at the poll interval.
    pub async fn run(mut self, lines: mpsc::Sender<String>) {
        let poll = self.config.poll_interval();

        loop {
            match self.read_line().await {
                Ok(Some(line)) => {
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    if lines.is_closed() {
                        break;
                    }
                    tokio::time::sleep(poll).await;
                    if let Err(e) = self.follow().await {
                        warn!(path = %self.path.display(), error = %e, "Failed to check log file");
                    }
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to read log file");
                    tokio::time::sleep(poll).await;
                }
            }
        }

        debug!(path = %self.path.display(), "Stopped following log file");
    }
}

/// Opens `path` and follows it on a background task
pub async fn spawn_tail(
    path: impl AsRef<Path>,
    config: TailConfig,
    buffer: usize,
) -> MonitorResult<mpsc::Receiver<String>> {
    let tail = LogTail::open(path, config).await?;
    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(tail.run(tx));
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn config() -> TailConfig {
        TailConfig {
            poll_interval_ms: 10,
            from_start: true,
        }
    }

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogTail::open(dir.path().join("nope.log"), config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MonitorError::LogSource { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_reads_lines_and_holds_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "first\r\nsecond\nthi");

        let mut tail = LogTail::open(&path, config()).await.unwrap();
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(tail.read_line().await.unwrap(), None);

        append(&path, "rd\n");
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(tail.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_from_end_skips_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "old\n");

        let mut tail = LogTail::open(
            &path,
            TailConfig {
                from_start: false,
                ..config()
            },
        )
        .await
        .unwrap();
        assert_eq!(tail.read_line().await.unwrap(), None);

        append(&path, "new\n");
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_truncation_restarts_from_beginning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "one\ntwo\n");

        let mut tail = LogTail::open(&path, config()).await.unwrap();
        assert!(tail.read_line().await.unwrap().is_some());
        assert!(tail.read_line().await.unwrap().is_some());
        assert_eq!(tail.read_line().await.unwrap(), None);

        std::fs::write(&path, "3\n").unwrap();
        tail.follow().await.unwrap();
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rotation_reopens_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "before\n");

        let mut tail = LogTail::open(&path, config()).await.unwrap();
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("before"));

        std::fs::rename(&path, dir.path().join("access.log.1")).unwrap();
        tail.follow().await.unwrap();
        assert_eq!(tail.read_line().await.unwrap(), None);

        append(&path, "after rotation\n");
        tail.follow().await.unwrap();
        assert_eq!(
            tail.read_line().await.unwrap().as_deref(),
            Some("after rotation")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lines_written_before_rotation_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "before\n");

        let mut tail = LogTail::open(&path, config()).await.unwrap();
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("before"));
        assert_eq!(tail.read_line().await.unwrap(), None);

        // Written to the old file after our last read, then rotated away
        append(&path, "late\nunterminated");
        std::fs::rename(&path, dir.path().join("access.log.1")).unwrap();
        append(&path, "new\n");

        tail.follow().await.unwrap();
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("late"));
        assert_eq!(
            tail.read_line().await.unwrap().as_deref(),
            Some("unterminated")
        );
        assert_eq!(tail.read_line().await.unwrap().as_deref(), Some("new"));
        assert_eq!(tail.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_spawn_tail_streams_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "a\n");

        let mut rx = spawn_tail(&path, config(), 16).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(first.unwrap().as_deref(), Some("a"));

        append(&path, "b\n");
        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(second.unwrap().as_deref(), Some("b"));
    }
}
