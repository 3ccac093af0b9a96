//! CSV-backed backup log and pending queue.
//!
//! Both files start with [`RECORD_HEADER`]. The backup file only grows; the
//! pending file holds records whose delivery is unconfirmed and is removed
//! once it has nothing left in it. File work runs on the blocking pool.

use crate::error::StorageError;
use crate::types::record::{FormRecord, RECORD_HEADER};
use serde::Serialize;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const BACKUP_FILE: &str = "results.csv";
pub const PENDING_FILE: &str = "pending_data.csv";

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub succeeded: usize,
    /// Records put back: the one that failed and every record after it.
    pub failed: usize,
}

struct QueueFiles {
    backup_path: PathBuf,
    pending_path: PathBuf,
    /// Held for every read-modify-write of either file.
    lock: Mutex<()>,
}

pub struct DurableQueue {
    files: Arc<QueueFiles>,
    /// Serialises drains; held across delivery awaits.
    drain_lock: tokio::sync::Mutex<()>,
}

impl DurableQueue {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self::with_paths(dir.join(BACKUP_FILE), dir.join(PENDING_FILE))
    }

    pub fn with_paths(backup_path: PathBuf, pending_path: PathBuf) -> Self {
        Self {
            files: Arc::new(QueueFiles {
                backup_path,
                pending_path,
                lock: Mutex::new(()),
            }),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn backup_path(&self) -> &Path {
        &self.files.backup_path
    }

    pub fn pending_path(&self) -> &Path {
        &self.files.pending_path
    }

    pub async fn append_backup(&self, record: &FormRecord) -> Result<(), StorageError> {
        let record = record.clone();
        self.with_files(move |files| {
            append_row(&files.backup_path, &record)?;
            debug!(path = %files.backup_path.display(), "Record appended to backup log");
            Ok(())
        })
        .await
    }

    pub async fn enqueue_pending(&self, record: &FormRecord) -> Result<(), StorageError> {
        let record = record.clone();
        self.with_files(move |files| {
            append_row(&files.pending_path, &record)?;
            info!(
                path = %files.pending_path.display(),
                email = record.email(),
                "Record queued for later delivery"
            );
            Ok(())
        })
        .await
    }

    pub fn has_pending(&self) -> bool {
        self.files.pending_path.exists()
    }

    pub async fn pending_len(&self) -> Result<usize, StorageError> {
        self.with_files(|files| Ok(read_records(&files.pending_path)?.len()))
            .await
    }

    /// Hand each pending record to `deliver` in file order, stopping at the
    /// first failure. Delivered records are dropped from the file; the rest,
    /// plus anything enqueued meanwhile, are written back.
    pub async fn drain_pending<F, Fut, E>(&self, mut deliver: F) -> Result<DrainReport, StorageError>
    where
        F: FnMut(FormRecord) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let _drain = self.drain_lock.lock().await;

        let mut snapshot = self
            .with_files(|files| {
                let records = read_records(&files.pending_path)?;
                if records.is_empty() {
                    remove_if_exists(&files.pending_path)?;
                }
                Ok(records)
            })
            .await?;
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut succeeded = 0;
        for record in &snapshot {
            let email = record.email().to_string();
            match deliver(record.clone()).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!(error = %e, email, position = succeeded, "Pending delivery failed, stopping drain");
                    break;
                }
            }
        }

        let taken = snapshot.len();
        let unsent = snapshot.split_off(succeeded);
        let enqueued_meanwhile = self
            .with_files(move |files| {
                let current = read_records(&files.pending_path)?;
                let appended = current.get(taken..).unwrap_or_default();
                let remaining: Vec<&FormRecord> = unsent.iter().chain(appended).collect();
                if remaining.is_empty() {
                    remove_if_exists(&files.pending_path)?;
                } else {
                    rewrite(&files.pending_path, &remaining)?;
                }
                Ok(appended.len())
            })
            .await?;

        let report = DrainReport {
            succeeded,
            failed: taken - succeeded,
        };
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            enqueued_during_drain = enqueued_meanwhile,
            "Pending queue drained"
        );
        Ok(report)
    }

    /// Run `op` on the blocking pool with the file lock held.
    async fn with_files<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&QueueFiles) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let files = Arc::clone(&self.files);
        tokio::task::spawn_blocking(move || {
            let _guard = files.lock.lock().unwrap_or_else(PoisonError::into_inner);
            op(&*files)
        })
        .await?
    }
}

fn append_row(path: &Path, record: &FormRecord) -> Result<(), StorageError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(StorageError::io(path))?;
    let needs_header = file.metadata().map_err(StorageError::io(path))?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if needs_header {
        writer
            .write_record(RECORD_HEADER)
            .map_err(StorageError::csv(path))?;
    }
    writer
        .write_record(record.as_row())
        .map_err(StorageError::csv(path))?;
    writer.flush().map_err(StorageError::io(path))?;
    writer.get_ref().sync_data().map_err(StorageError::io(path))
}

/// All data rows; an absent file reads as empty. The first row is always
/// taken as the header, whatever its width.
fn read_records(path: &Path) -> Result<Vec<FormRecord>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(path)(e)),
    };
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file)
        .records()
        .map(|row| row.map(|r| FormRecord::from_row(&r)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StorageError::csv(path))
}

/// Replace `path` with header + `records` via a sibling temp file and rename.
fn rewrite(path: &Path, records: &[&FormRecord]) -> Result<(), StorageError> {
    let tmp = path.with_extension("csv.tmp");
    let file = File::create(&tmp).map_err(StorageError::io(&tmp))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(RECORD_HEADER)
        .map_err(StorageError::csv(&tmp))?;
    for record in records {
        writer
            .write_record(record.as_row())
            .map_err(StorageError::csv(&tmp))?;
    }
    writer.flush().map_err(StorageError::io(&tmp))?;
    writer.get_ref().sync_data().map_err(StorageError::io(&tmp))?;
    drop(writer);
    fs::rename(&tmp, path).map_err(StorageError::io(path))
}

fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path)(e)),
    }
}
