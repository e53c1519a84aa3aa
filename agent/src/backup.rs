/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Backup Orchestrator: drives one backup job through its fixed stage
//! pipeline, inserting the object-store upload between `backup` and
//! `backup-cleanup`. Runs as a single `tokio::spawn`ed task per job; the
//! HTTP surface never waits on it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use slog::{error, info, Logger};

use crate::config::Config;
use crate::gateway::{self, destination_env};
use crate::registry::{JobKind, JobRecord, JobStatus, Registry};
use crate::stage::{self, redacted_args};
use crate::types::BackupRequest;

const STAGES: [&str; 6] = [
    "pre-backup-lock",
    "pre-backup-check",
    "backup",
    "transfer",
    "backup-cleanup",
    "post-backup-unlock",
];

pub async fn run(
    registry: Arc<Registry>,
    config: Arc<Config>,
    log: Logger,
    req: BackupRequest,
) {
    let id = req.id.clone();
    let started = Instant::now();
    let skip_storage = config.skip_storage || req.destination.skip_storage;

    let mut record = match registry.get(JobKind::Backup, &id) {
        Some(r) => r,
        None => {
            error!(log, "backup job vanished before orchestrator ran"; "id" => &id);
            registry.release();
            return;
        }
    };
    record.destination_type = Some(req.destination.kind.type_name().to_string());
    record.skip_storage = skip_storage;
    if let crate::types::DestinationKind::S3 { bucket, region, .. } = &req.destination.kind {
        record.bucket = Some(bucket.clone());
        record.region = Some(region.clone());
    }

    let mut params_env = HashMap::new();
    for entry in req.database.env_entries() {
        if let Some((k, v)) = entry.split_once('=') {
            params_env.insert(k.to_string(), v.to_string());
        }
    }
    let mut dest_env = if skip_storage { HashMap::new() } else { destination_env(&req.destination.kind) };
    dest_env.extend(params_env);
    let env = dest_env;

    let mut failure: Option<String> = None;

    for stage_name in STAGES {
        if failure.is_some() {
            break;
        }

        if stage_name == "transfer" {
            // The upload runs as part of the `backup` stage's state, not a
            // distinct one: original_source's backup.go calls the S3 upload
            // while `state = NameBackup`, so a failure here must report
            // `state="backup"`, matching spec.md §8 S2's sibling scenario.
            record.current_stage = "backup".to_string();
            let _ = registry.update(JobKind::Backup, &id, record.clone());
            match run_transfer(&registry, &config, &log, &id, &req, skip_storage).await {
                Ok((filename, size)) => {
                    record.filename = Some(filename);
                    record.filesize.size = size;
                }
                Err(msg) => {
                    failure = Some(msg);
                }
            }
            let _ = registry.update(JobKind::Backup, &id, record.clone());
            continue;
        }

        record.current_stage = stage_name.to_string();
        let _ = registry.update(JobKind::Backup, &id, record.clone());

        let args = backup_stage_args(stage_name, &req, &id);
        let redact_at = backup_redact_indices(stage_name);
        info!(log, "running backup stage";
            "id" => &id, "stage" => stage_name,
            "args" => format!("{:?}", redacted_args(&args, &redact_at)));

        match stage::run_stage(&config.scripts_path, stage_name, &args, &env).await {
            Ok(outcome) => {
                record.record_stage_logs(stage_name, &outcome.stdout, &outcome.stderr);
            }
            Err(stage::StageError::NoScript(_)) => {
                record.record_stage_logs(stage_name, "", "");
                failure = Some(format!("no script for stage {stage_name}"));
            }
            Err(stage::StageError::NonZeroExit { stdout, stderr, status, .. }) => {
                record.record_stage_logs(stage_name, &stdout, &stderr);
                failure = Some(format!("stage {stage_name} exited with status {status}"));
            }
            Err(stage::StageError::Spawn { source, .. }) => {
                record.record_stage_logs(stage_name, "", "");
                failure = Some(format!("failed to launch stage {stage_name}: {source}"));
            }
        }
        let _ = registry.update(JobKind::Backup, &id, record.clone());
    }

    finalize(&registry, &log, &id, JobKind::Backup, &mut record, failure, started);
}

async fn run_transfer(
    _registry: &Arc<Registry>,
    config: &Arc<Config>,
    log: &Logger,
    id: &str,
    req: &BackupRequest,
    skip_storage: bool,
) -> Result<(String, i64), String> {
    if matches!(req.destination.kind, crate::types::DestinationKind::Unknown) {
        return Err("unsupported destination type".to_string());
    }

    let object_name = backup_object_name(req);

    if skip_storage {
        info!(log, "skip-storage backup transfer"; "id" => id);
        return Ok((object_name, 0));
    }

    let job_dir = Path::new(&config.directory_backup).join(id);
    let local_path = first_file_in(&job_dir).ok_or_else(|| {
        format!("no output file found in {}", job_dir.display())
    })?;

    match gateway::upload(&local_path, &object_name, &req.destination.kind, false).await {
        Ok(outcome) => Ok((outcome.filename, outcome.size)),
        Err(e) => Err(e.to_string()),
    }
}

fn first_file_in(dir: &Path) -> Option<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
}

fn backup_object_name(req: &BackupRequest) -> String {
    let stamp = backup_agent_common::compact_utc_stamp(chrono::Utc::now());
    format!("{}_{}_{}", stamp, req.database.host, req.database.database)
}

fn backup_stage_args(stage_name: &str, req: &BackupRequest, id: &str) -> Vec<String> {
    if stage_name == "backup" {
        vec![
            req.database.host.clone(),
            req.database.username.clone(),
            req.database.password.clone(),
            req.database.database.clone(),
            backup_object_name(req),
            id.to_string(),
            req.compression.to_string(),
            req.encryption_key.clone().unwrap_or_default(),
        ]
    } else {
        vec![id.to_string()]
    }
}

fn backup_redact_indices(stage_name: &str) -> Vec<usize> {
    if stage_name == "backup" {
        // password at index 2, encryption_key at index 7.
        vec![2, 7]
    } else {
        vec![]
    }
}

pub(crate) fn finalize(
    registry: &Arc<Registry>,
    log: &Logger,
    id: &str,
    kind: JobKind,
    record: &mut JobRecord,
    failure: Option<String>,
    started: Instant,
) {
    let end = chrono::Utc::now();
    record.end_time = Some(end);
    record.execution_time_ms = Some(started.elapsed().as_millis() as i64);

    match failure {
        None => {
            record.current_stage = "finished".to_string();
            record.status = JobStatus::Succeeded;
            info!(log, "job finished"; "id" => id);
        }
        Some(msg) => {
            record.status = JobStatus::Failed;
            record.error_message = Some(msg.clone());
            error!(log, "job failed"; "id" => id, "stage" => &record.current_stage, "error" => msg);
        }
    }

    let _ = registry.update(kind, id, record.clone());
    registry.release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DatabaseDescriptor, Destination, DestinationKind};

    fn sample_request() -> BackupRequest {
        BackupRequest {
            id: "j1".to_string(),
            compression: true,
            encryption_key: Some("topsecret".to_string()),
            destination: Destination {
                kind: DestinationKind::Unknown,
                filename: None,
                skip_storage: false,
            },
            database: DatabaseDescriptor {
                host: "db.internal".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
                database: "mydb".to_string(),
                parameters: vec![],
            },
        }
    }

    #[test]
    fn backup_stage_args_redacts_password_and_key_positions() {
        let req = sample_request();
        let args = backup_stage_args("backup", &req, "j1");
        let redacted = redacted_args(&args, &backup_redact_indices("backup"));
        assert_eq!(redacted[2], backup_agent_common::REDACTED);
        assert_eq!(redacted[7], backup_agent_common::REDACTED);
        assert_eq!(redacted[0], "db.internal");
    }

    #[test]
    fn object_name_follows_timestamp_host_database_pattern() {
        let req = sample_request();
        let name = backup_object_name(&req);
        assert!(name.ends_with("_db.internal_mydb"));
    }
}
