use {
    super::*,
    async_trait::async_trait,
    snafu::Snafu,
    tokio::{
        fs::File,
        io::{AsyncReadExt, AsyncSeekExt, SeekFrom},
        time::{Instant, sleep},
    },
};

const READ_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Snafu)]
pub(crate) enum SourceError {
    #[snafu(display("share log missing: {path}"))]
    LogMissing { path: String },
    #[snafu(display("share log read failed: {message}"))]
    Read { message: String },
}

impl SourceError {
    /// Fatal errors mean the log itself is gone, not a transient hiccup;
    /// the consumer terminates the process on these.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, Self::LogMissing { .. })
    }
}

#[derive(Debug)]
pub(crate) enum SourceMessage {
    /// One complete record. `offset` is the record's index in the log.
    Record { payload: Vec<u8>, offset: u64 },
    /// Caught up with the producer. Benign; reported once per catch-up.
    EndOfLog,
    Error(SourceError),
}

/// Consumption-side seam to the share log. `poll` returns `None` when the
/// timeout elapses with nothing new.
#[async_trait]
pub(crate) trait ShareSource: Send {
    async fn poll(&mut self, timeout: Duration) -> Option<SourceMessage>;
}

/// Tails an append-only file of fixed-size records. The read cursor is a
/// record index, so seeking to `tail - backlog` is plain arithmetic and a
/// restart replays a bounded window of history.
pub(crate) struct FileShareLog {
    path: PathBuf,
    file: File,
    record_size: usize,
    offset: u64,
    at_eof: bool,
}

impl FileShareLog {
    /// Open `path` positioned `backlog` records before its current tail.
    /// Fails if the log cannot be opened; the caller treats that as a
    /// startup error.
    pub(crate) async fn open_tail(path: PathBuf, record_size: usize, backlog: u64) -> Result<Self> {
        let mut file = File::open(&path)
            .await
            .with_context(|| format!("failed to open share log {}", path.display()))?;

        let records = file.metadata().await?.len() / record_size as u64;
        let offset = records.saturating_sub(backlog);

        file.seek(SeekFrom::Start(offset * record_size as u64))
            .await?;

        info!(
            "share log {} has {records} records, starting at offset {offset}",
            path.display()
        );

        Ok(Self {
            path,
            file,
            record_size,
            offset,
            at_eof: false,
        })
    }

    /// Read the next record if the file holds one. A partial record at the
    /// tail (producer mid-write) reads as not-ready; the cursor rewinds so
    /// the next attempt sees the whole record.
    async fn read_record(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut payload = vec![0u8; self.record_size];
        let mut filled = 0;

        while filled < payload.len() {
            let count = self
                .file
                .read(&mut payload[filled..])
                .await
                .map_err(|err| SourceError::Read {
                    message: err.to_string(),
                })?;

            if count == 0 {
                if filled > 0 {
                    self.file
                        .seek(SeekFrom::Current(-(filled as i64)))
                        .await
                        .map_err(|err| SourceError::Read {
                            message: err.to_string(),
                        })?;
                }
                return Ok(None);
            }

            filled += count;
        }

        Ok(Some(payload))
    }
}

#[async_trait]
impl ShareSource for FileShareLog {
    async fn poll(&mut self, timeout: Duration) -> Option<SourceMessage> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.read_record().await {
                Ok(Some(payload)) => {
                    let offset = self.offset;
                    self.offset += 1;
                    self.at_eof = false;
                    return Some(SourceMessage::Record { payload, offset });
                }
                Ok(None) => {
                    if !self.path.exists() {
                        return Some(SourceMessage::Error(SourceError::LogMissing {
                            path: self.path.display().to_string(),
                        }));
                    }

                    if !self.at_eof {
                        self.at_eof = true;
                        return Some(SourceMessage::EndOfLog);
                    }
                }
                Err(err) => return Some(SourceMessage::Error(err)),
            }

            if Instant::now() + READ_RETRY_INTERVAL > deadline {
                return None;
            }

            sleep(READ_RETRY_INTERVAL).await;
        }
    }
}
