/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Restore Orchestrator: mirrors the Backup Orchestrator, with the
//! transfer step before `restore` instead of after `backup`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use slog::{error, info, Logger};

use crate::backup::finalize;
use crate::config::Config;
use crate::gateway::{self, destination_env};
use crate::registry::{JobKind, Registry};
use crate::stage::{self, redacted_args};
use crate::types::RestoreRequest;

const STAGES: [&str; 5] =
    ["pre-restore-lock", "transfer", "restore", "restore-cleanup", "post-restore-unlock"];

pub async fn run(
    registry: Arc<Registry>,
    config: Arc<Config>,
    log: Logger,
    req: RestoreRequest,
) {
    let id = req.id.clone();
    let started = Instant::now();
    let skip_storage = config.skip_storage || req.destination.skip_storage;

    let mut record = match registry.get(JobKind::Restore, &id) {
        Some(r) => r,
        None => {
            error!(log, "restore job vanished before orchestrator ran"; "id" => &id);
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
    let filename = req.destination.filename.clone().unwrap_or_default();
    record.filename = Some(filename.clone());

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
            // The download runs as part of the `restore` stage's state, not
            // a distinct one: original_source's restore.go calls
            // downloadFromS3 while `state = NameRestore`, so a FileExists or
            // download failure must report `state="restore"` (spec.md §8 S5).
            record.current_stage = "restore".to_string();
            let _ = registry.update(JobKind::Restore, &id, record.clone());
            match run_transfer(&config, &log, &id, &req, &filename, skip_storage).await {
                Ok(size) => record.filesize.size = size,
                Err(msg) => failure = Some(msg),
            }
            let _ = registry.update(JobKind::Restore, &id, record.clone());
            continue;
        }

        record.current_stage = stage_name.to_string();
        let _ = registry.update(JobKind::Restore, &id, record.clone());

        let args = restore_stage_args(stage_name, &req, &id, &filename);
        let redact_at = restore_redact_indices(stage_name);
        info!(log, "running restore stage";
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
        let _ = registry.update(JobKind::Restore, &id, record.clone());
    }

    finalize(&registry, &log, &id, JobKind::Restore, &mut record, failure, started);
}

async fn run_transfer(
    config: &Arc<Config>,
    log: &Logger,
    id: &str,
    req: &RestoreRequest,
    filename: &str,
    skip_storage: bool,
) -> Result<i64, String> {
    if matches!(req.destination.kind, crate::types::DestinationKind::Unknown) {
        return Err("unsupported destination type".to_string());
    }

    let job_dir = Path::new(&config.directory_restore).join(id);
    let local_path = job_dir.join(filename);

    if local_path.exists() {
        if config.allowed_to_delete_files {
            std::fs::remove_file(&local_path)
                .map_err(|e| format!("failed to remove existing file: {e}"))?;
        } else {
            return Err(format!("file already exists at {}", local_path.display()));
        }
    }

    if skip_storage {
        info!(log, "skip-storage restore transfer"; "id" => id);
        return Ok(0);
    }

    std::fs::create_dir_all(&job_dir).map_err(|e| format!("failed to create job directory: {e}"))?;

    gateway::download(filename, &local_path, &req.destination.kind)
        .await
        .map_err(|e| e.to_string())?;

    let size = std::fs::metadata(&local_path).map(|m| m.len() as i64).unwrap_or(0);
    Ok(size)
}

fn restore_stage_args(stage_name: &str, req: &RestoreRequest, id: &str, filename: &str) -> Vec<String> {
    if stage_name == "restore" {
        vec![
            req.database.host.clone(),
            req.database.username.clone(),
            req.database.password.clone(),
            req.database.database.clone(),
            filename.to_string(),
            id.to_string(),
            req.compression.to_string(),
            req.encryption_key.clone().unwrap_or_default(),
        ]
    } else {
        vec![id.to_string()]
    }
}

fn restore_redact_indices(stage_name: &str) -> Vec<usize> {
    if stage_name == "restore" {
        vec![2, 7]
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DatabaseDescriptor, Destination, DestinationKind};

    fn sample_request() -> RestoreRequest {
        RestoreRequest {
            id: "j1".to_string(),
            compression: false,
            encryption_key: None,
            destination: Destination {
                kind: DestinationKind::Unknown,
                filename: Some("backup.tar".to_string()),
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
    fn restore_stage_args_redacts_password_and_key_positions() {
        let req = sample_request();
        let args = restore_stage_args("restore", &req, "j1", "backup.tar");
        let redacted = redacted_args(&args, &restore_redact_indices("restore"));
        assert_eq!(redacted[2], backup_agent_common::REDACTED);
        assert_eq!(redacted[7], backup_agent_common::REDACTED);
        assert_eq!(redacted[4], "backup.tar");
    }
}
