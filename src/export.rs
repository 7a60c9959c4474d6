// Export driver: sweep, join, filter, serialize, commit

use crate::config::ExportPlan;
use crate::error::{ExportError, Result};
use crate::filter::FilterSpec;
use crate::join::{Joined, SkipCounts, SkipReason, join};
use crate::jsonl::{self, SchemaOptions};
use crate::models::JoinedRecord;
use crate::store::Store;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROGRESS_INTERVAL: u64 = 5_000;

/// Called with the running totals after every scanned record
pub type ProgressCallback = Box<dyn Fn(&ExportResult) + Send>;

/// Cooperative cancellation flag, checked between records
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one export run
///
/// Every scanned event is accounted for exactly once:
/// `scanned == emitted + filtered + skipped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportResult {
    pub output_path: PathBuf,
    pub scanned: u64,
    pub emitted: u64,
    pub filtered: u64,
    pub skipped: u64,
    pub skip_counts: SkipCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_timestamp_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp_ms: Option<i64>,
    pub cancelled: bool,
}

impl ExportResult {
    fn record_emitted(&mut self, timestamp_ms: i64) {
        self.emitted += 1;
        self.first_timestamp_ms.get_or_insert(timestamp_ms);
        self.last_timestamp_ms = Some(timestamp_ms);
    }

    fn record_skipped(&mut self, reason: SkipReason) {
        self.skip_counts.record(reason);
        self.skipped = self.skip_counts.total();
    }
}

/// Export with default schema options, no cancellation and no timeout
pub fn run(store_path: &Path, filter: &FilterSpec, output_path: &Path) -> Result<ExportResult> {
    Exporter::new(store_path, output_path, filter.clone()).run()
}

/// A configured export
///
/// The output file is written to a temporary sibling and renamed into place
/// only when the run completes or is cancelled. A failed run leaves any
/// existing file at the output path untouched.
pub struct Exporter {
    store_path: PathBuf,
    output_path: PathBuf,
    filter: FilterSpec,
    schema: SchemaOptions,
    cancel: CancelToken,
    timeout: Option<Duration>,
    progress_callback: Option<ProgressCallback>,
}

impl Exporter {
    pub fn new(store_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>, filter: FilterSpec) -> Self {
        Self {
            store_path: store_path.into(),
            output_path: output_path.into(),
            filter,
            schema: SchemaOptions::default(),
            cancel: CancelToken::new(),
            timeout: None,
            progress_callback: None,
        }
    }

    pub fn from_plan(plan: ExportPlan) -> Self {
        Self::new(plan.store_path, plan.output_path, plan.filter)
            .schema(plan.schema)
            .timeout(plan.timeout)
    }

    pub fn schema(mut self, schema: SchemaOptions) -> Self {
        self.schema = schema;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop cleanly once this much time has passed
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&ExportResult) + Send + 'static) -> Self {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn run(self) -> Result<ExportResult> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);

        if self.filter.is_empty_range() {
            return Err(ExportError::config("earliest timestamp is after latest timestamp"));
        }
        self.ensure_output_is_not_store()?;

        let store = Store::open(&self.store_path)?;
        info!(store = ?self.store_path, schema = ?store.schema(), "Opened collection");

        let output_dir = output_dir(&self.output_path)?;
        fs::create_dir_all(&output_dir)
            .map_err(|e| ExportError::io(format!("cannot create directory {}", output_dir.display()), e))?;
        self.ensure_output_is_not_store()?;
        let _lock = self.lock_output(&output_dir)?;

        let temp = tempfile::Builder::new()
            .prefix(".revlog-export-")
            .suffix(".tmp")
            .tempfile_in(&output_dir)
            .map_err(|e| ExportError::io(format!("cannot create temporary file in {}", output_dir.display()), e))?;
        let mut writer = BufWriter::new(temp);

        let mut result = ExportResult {
            output_path: self.output_path.clone(),
            ..Default::default()
        };

        let events = match self.filter.lower_bound() {
            Some(from) => store.review_events_since(from),
            None => store.review_events(),
        };

        for event in events {
            if self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(scanned = result.scanned, emitted = result.emitted, "Export cancelled; keeping records written so far");
                result.cancelled = true;
                break;
            }

            let event = event?;
            if self.filter.is_past_upper_bound(event.timestamp_ms()) {
                debug!(event_id = event.id, "Reached end of time range");
                break;
            }
            result.scanned += 1;

            match join(event, &store)? {
                Joined::Skipped(reason) => result.record_skipped(reason),
                Joined::Record(record) if !self.filter.accepts(&record) => result.filtered += 1,
                Joined::Record(record) => self.emit(&record, &mut writer, &mut result)?,
            }

            if let Some(callback) = &self.progress_callback {
                callback(&result);
            }

            if result.scanned % PROGRESS_INTERVAL == 0 {
                info!(
                    scanned = result.scanned,
                    emitted = result.emitted,
                    skipped = result.skipped,
                    "Export progress"
                );
            }
        }

        let temp = writer
            .into_inner()
            .map_err(|e| ExportError::io("failed to flush output", e.into_error()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| ExportError::io("failed to sync output", e))?;
        self.ensure_output_is_not_store()?;
        temp.persist(&self.output_path)
            .map_err(|e| ExportError::io(format!("cannot write {}", self.output_path.display()), e.error))?;

        info!(
            output = ?self.output_path,
            scanned = result.scanned,
            emitted = result.emitted,
            filtered = result.filtered,
            skipped = result.skipped,
            cancelled = result.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Export complete"
        );
        Ok(result)
    }

    /// Serialize fully before writing so a failure never leaves half a line
    fn emit<W: Write>(&self, record: &JoinedRecord, writer: &mut W, result: &mut ExportResult) -> Result<()> {
        let line = match jsonl::serialize(record, &self.schema) {
            Ok(line) => line,
            Err(e) => {
                debug!(event_id = record.event.id, error = %e, "Skipping review: cannot encode record");
                result.record_skipped(SkipReason::Unencodable);
                return Ok(());
            }
        };

        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| ExportError::io("failed to write output", e))?;
        result.record_emitted(record.event.timestamp_ms());
        Ok(())
    }

    fn ensure_output_is_not_store(&self) -> Result<()> {
        if refers_to_same_file(&self.store_path, &self.output_path) {
            return Err(ExportError::config(format!(
                "output path {} refers to the store {}",
                self.output_path.display(),
                self.store_path.display()
            )));
        }
        Ok(())
    }

    /// Exclusive advisory lock on `.<name>.lock` next to the output
    ///
    /// Held until the returned file is dropped. The lock file itself is left
    /// in place.
    fn lock_output(&self, output_dir: &Path) -> Result<File> {
        let name = self
            .output_path
            .file_name()
            .ok_or_else(|| ExportError::config(format!("{} is not a file path", self.output_path.display())))?;
        let lock_path = output_dir.join(format!(".{}.lock", name.to_string_lossy()));

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| ExportError::io(format!("cannot open lock file {}", lock_path.display()), e))?;
        file.try_lock_exclusive().map_err(|e| {
            ExportError::io(
                format!("{} is being written by another export", self.output_path.display()),
                e,
            )
        })?;

        debug!(lock = ?lock_path, "Acquired output lock");
        Ok(file)
    }
}

/// True when writing `output` would replace `store`, however either is spelled
///
/// Catches `..` and symlinked directories by resolving the output's parent,
/// and hard links or a symlinked output file by comparing inodes.
pub(crate) fn refers_to_same_file(store: &Path, output: &Path) -> bool {
    if store == output || same_inode(store, output) {
        return true;
    }

    let Ok(store) = fs::canonicalize(store) else {
        return false;
    };
    let resolved_output = output_dir(output)
        .ok()
        .and_then(|dir| fs::canonicalize(dir).ok())
        .zip(output.file_name())
        .map(|(dir, name)| dir.join(name));
    resolved_output.is_some_and(|output| output == store)
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_inode(_a: &Path, _b: &Path) -> bool {
    false
}

fn output_dir(output_path: &Path) -> Result<PathBuf> {
    match output_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(PathBuf::from(".")),
        Some(parent) => Ok(parent.to_path_buf()),
        None => Err(ExportError::config(format!(
            "{} is not a file path",
            output_path.display()
        ))),
    }
}
