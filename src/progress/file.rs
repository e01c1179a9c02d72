use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::TaskName;
use crate::errors::ProgressError;

use super::{
    ProgressOp, ProgressStore, TaskProgress, apply_to_map, check_name, check_op, check_record,
};

/// Default location of the progress document, relative to the working
/// directory.
pub const DEFAULT_PROGRESS_FILE: &str = ".taskseq/progress.json";

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the progress document.
#[derive(Debug, Serialize, Deserialize)]
struct ProgressDocument {
    version: u32,
    #[serde(default)]
    tasks: BTreeMap<TaskName, TaskProgress>,
}

impl Default for ProgressDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            tasks: BTreeMap::new(),
        }
    }
}

/// Stores progress records in a single JSON document.
///
/// Every write rewrites the whole document through a temporary file that is
/// renamed over the original, so readers never observe a half-written file.
/// Writes from this process are serialized; separate processes sharing one
/// file are not coordinated.
#[derive(Debug)]
pub struct FileProgressStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, ProgressError> {
        self.lock.lock().map_err(|_| ProgressError::Poisoned)
    }

    /// Load, modify and persist the document under the process lock.
    fn update<F>(&self, f: F) -> Result<(), ProgressError>
    where
        F: FnOnce(&mut BTreeMap<TaskName, TaskProgress>),
    {
        let _guard = self.guard()?;
        let mut doc = read_document(&self.path)?;
        f(&mut doc.tasks);
        write_document(&self.path, &doc)
    }

    /// Every record currently in the document.
    pub fn load_all(&self) -> Result<BTreeMap<TaskName, TaskProgress>, ProgressError> {
        let _guard = self.guard()?;
        Ok(read_document(&self.path)?.tasks)
    }
}

impl ProgressStore for FileProgressStore {
    fn save(&self, task_name: &str, progress: &TaskProgress) -> Result<(), ProgressError> {
        check_record(task_name, progress)?;
        self.update(|tasks| {
            tasks.insert(task_name.to_string(), progress.clone());
        })?;
        debug!(task = %task_name, processed = progress.processed_items(), "saved progress (file)");
        Ok(())
    }

    fn load(&self, task_name: &str) -> Result<Option<TaskProgress>, ProgressError> {
        check_name(task_name)?;
        let _guard = self.guard()?;
        Ok(read_document(&self.path)?.tasks.remove(task_name))
    }

    fn mark_completed(&self, task_name: &str) -> Result<(), ProgressError> {
        check_name(task_name)?;
        let op = ProgressOp::MarkCompleted(task_name.to_string());
        self.update(|tasks| apply_to_map(tasks, &op))?;
        info!(task = %task_name, "marked task completed (file)");
        Ok(())
    }

    fn clear(&self, task_name: &str) -> Result<(), ProgressError> {
        check_name(task_name)?;
        let _guard = self.guard()?;
        let mut doc = read_document(&self.path)?;
        if doc.tasks.remove(task_name).is_some() {
            write_document(&self.path, &doc)?;
            debug!(task = %task_name, "cleared progress (file)");
        }
        Ok(())
    }

    /// The whole batch lands in one document rewrite.
    fn apply_batch(&self, ops: &[ProgressOp]) -> Result<(), ProgressError> {
        for op in ops {
            check_op(op)?;
        }
        if ops.is_empty() {
            return Ok(());
        }
        self.update(|tasks| {
            for op in ops {
                apply_to_map(tasks, op);
            }
        })
    }
}

fn read_document(path: &Path) -> Result<ProgressDocument, ProgressError> {
    if !path.exists() {
        return Ok(ProgressDocument::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(ProgressDocument::default());
    }
    let doc: ProgressDocument = serde_json::from_str(&content)?;
    for (name, progress) in &doc.tasks {
        check_record(name, progress)?;
    }
    Ok(doc)
}

fn write_document(path: &Path, doc: &ProgressDocument) -> Result<(), ProgressError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, doc)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
