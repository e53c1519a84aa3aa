/*
 * Copyright 2026 Backup Agent Contributors
 */

//! The job registry: a thread-safe map of job id -> job record, with
//! admission control via a capped in-flight counter. Mirrors spec.md
//! §4.1 exactly: two independently-locked maps (backup, restore) and a
//! single lock guarding the in-flight counter, none of which is ever held
//! across an `.await` point.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Backup,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub enum JobStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileSize {
    pub size: i64,
}

/// The observable, mutable state of one job.
///
/// `logs` is flattened directly into the JSON response: each key is a
/// stage name with underscores (`pre_backup_lock`) suffixed with `_log`
/// or `_errorlog`, e.g. `backup_errorlog`. Serializing it this way lets
/// us grow/shrink the set of captured stages per job kind without a
/// bespoke struct per kind.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct JobRecord {
    pub id: String,
    #[serde(skip)]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(rename = "state")]
    pub current_stage: String,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub filename: Option<String>,
    pub filesize: FileSize,
    pub destination_type: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub skip_storage: bool,
    #[serde(flatten)]
    pub logs: BTreeMap<String, String>,
}

impl JobRecord {
    pub fn new(id: String, kind: JobKind) -> Self {
        JobRecord {
            id,
            kind,
            status: JobStatus::Running,
            current_stage: String::new(),
            message: None,
            error_message: None,
            start_time: Utc::now(),
            end_time: None,
            execution_time_ms: None,
            filename: None,
            filesize: FileSize { size: 0 },
            destination_type: None,
            bucket: None,
            region: None,
            skip_storage: false,
            logs: BTreeMap::new(),
        }
    }

    /// Record the captured stdout/stderr of a stage that ran, keyed as
    /// `<stage>_log` / `<stage>_errorlog` (stage name with `-` -> `_`).
    pub fn record_stage_logs(&mut self, stage: &str, stdout: &str, stderr: &str) {
        let key = stage.replace('-', "_");
        self.logs.insert(format!("{key}_log"), stdout.to_string());
        self.logs.insert(format!("{key}_errorlog"), stderr.to_string());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job {0} already exists")]
    AlreadyExists(String),
    #[error("job {0} not found")]
    NotFound(String),
}

struct KindRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl KindRegistry {
    fn new() -> Self {
        KindRegistry { jobs: Mutex::new(HashMap::new()) }
    }

    fn create(&self, id: &str, kind: JobKind) -> Result<JobRecord, RegistryError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(id) {
            return Err(RegistryError::AlreadyExists(id.to_string()));
        }
        let record = JobRecord::new(id.to_string(), kind);
        jobs.insert(id.to_string(), record.clone());
        Ok(record)
    }

    fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    fn update(&self, id: &str, record: JobRecord) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.lock().unwrap();
        if !jobs.contains_key(id) {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        jobs.insert(id.to_string(), record);
        Ok(())
    }

    fn remove(&self, id: &str) -> bool {
        self.jobs.lock().unwrap().remove(id).is_some()
    }
}

/// The process-wide job registry. Created once at startup, shared behind
/// an `Arc` by the HTTP surface and every orchestrator task.
pub struct Registry {
    backups: KindRegistry,
    restores: KindRegistry,
    inflight: Mutex<usize>,
    max_jobs: usize,
}

impl Registry {
    pub fn new(max_jobs: usize) -> Self {
        Registry {
            backups: KindRegistry::new(),
            restores: KindRegistry::new(),
            inflight: Mutex::new(0),
            max_jobs,
        }
    }

    fn kind_registry(&self, kind: JobKind) -> &KindRegistry {
        match kind {
            JobKind::Backup => &self.backups,
            JobKind::Restore => &self.restores,
        }
    }

    /// Must be called, and must succeed, before `create`. Rejects
    /// admission without mutating anything once the cap is reached.
    pub fn try_admit(&self) -> bool {
        let mut n = self.inflight.lock().unwrap();
        if *n < self.max_jobs {
            *n += 1;
            true
        } else {
            false
        }
    }

    /// Must be called exactly once per successful `try_admit`, regardless
    /// of job outcome (including a `create` race after a successful
    /// admit).
    pub fn release(&self) {
        let mut n = self.inflight.lock().unwrap();
        *n = n.saturating_sub(1);
    }

    pub fn create(&self, id: &str, kind: JobKind) -> Result<JobRecord, RegistryError> {
        self.kind_registry(kind).create(id, kind)
    }

    pub fn get(&self, kind: JobKind, id: &str) -> Option<JobRecord> {
        self.kind_registry(kind).get(id)
    }

    pub fn update(&self, kind: JobKind, id: &str, record: JobRecord) -> Result<(), RegistryError> {
        self.kind_registry(kind).update(id, record)
    }

    pub fn remove(&self, kind: JobKind, id: &str) -> bool {
        self.kind_registry(kind).remove(id)
    }

    #[cfg(test)]
    pub fn inflight(&self) -> usize {
        *self.inflight.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_respects_cap() {
        let r = Registry::new(2);
        assert!(r.try_admit());
        assert!(r.try_admit());
        assert!(!r.try_admit());
        r.release();
        assert!(r.try_admit());
    }

    #[test]
    fn release_never_goes_negative() {
        let r = Registry::new(1);
        r.release();
        r.release();
        assert_eq!(r.inflight(), 0);
        assert!(r.try_admit());
    }

    #[test]
    fn create_is_idempotent_rejecting() {
        let r = Registry::new(5);
        r.create("j1", JobKind::Backup).unwrap();
        assert!(matches!(
            r.create("j1", JobKind::Backup),
            Err(RegistryError::AlreadyExists(_))
        ));
        // A restore job with the same id is a different map entirely.
        assert!(r.create("j1", JobKind::Restore).is_ok());
    }

    #[test]
    fn update_requires_existing_record() {
        let r = Registry::new(5);
        let rec = JobRecord::new("j2".into(), JobKind::Backup);
        assert!(matches!(
            r.update(JobKind::Backup, "j2", rec),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn remove_then_get_is_none() {
        let r = Registry::new(5);
        r.create("j3", JobKind::Backup).unwrap();
        assert!(r.remove(JobKind::Backup, "j3"));
        assert!(r.get(JobKind::Backup, "j3").is_none());
        assert!(!r.remove(JobKind::Backup, "j3"));
    }
}
