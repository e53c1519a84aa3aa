/*
 * Copyright 2026 Backup Agent Contributors
 */

//! The stage runner: looks up and executes one shell stage script with an
//! explicit environment (no inheritance from the agent's own process),
//! empty stdin, and captured output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("no script found for stage {0}")]
    NoScript(String),
    #[error("failed to launch stage {stage}: {source}")]
    Spawn { stage: String, #[source] source: std::io::Error },
    #[error("stage {stage} exited with status {status}")]
    NonZeroExit { stage: String, status: i32, stdout: String, stderr: String },
}

pub struct StageOutcome {
    pub stdout: String,
    pub stderr: String,
}

/// Locates `<dir>/<stage>`, falling back to `<dir>/<stage>.sh`.
fn find_script(dir: &str, stage: &str) -> Option<PathBuf> {
    let bare = Path::new(dir).join(stage);
    if bare.is_file() {
        return Some(bare);
    }
    let with_ext = Path::new(dir).join(format!("{stage}.sh"));
    if with_ext.is_file() {
        return Some(with_ext);
    }
    None
}

/// Render `args` for a log line, masking the values at `redact_indices`.
/// Used so stage invocations can be logged without leaking passwords or
/// encryption keys that are passed positionally.
pub fn redacted_args(args: &[String], redact_indices: &[usize]) -> Vec<String> {
    args.iter()
        .enumerate()
        .map(|(i, a)| {
            if redact_indices.contains(&i) {
                backup_agent_common::REDACTED.to_string()
            } else {
                a.clone()
            }
        })
        .collect()
}

/// Run one stage script to completion.
///
/// `env` replaces the child's environment outright; `args` are passed
/// positionally; stdin is closed immediately so a script can never block
/// waiting on input it will never receive.
pub async fn run_stage(
    scripts_dir: &str,
    stage: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> Result<StageOutcome, StageError> {
    let script = find_script(scripts_dir, stage)
        .ok_or_else(|| StageError::NoScript(stage.to_string()))?;

    let mut cmd = Command::new(&script);
    cmd.args(args);
    cmd.env_clear();
    cmd.envs(env);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| StageError::Spawn {
        stage: stage.to_string(),
        source,
    })?;

    // Close stdin immediately; no stage script reads from it.
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.shutdown().await;
    }

    let output = child.wait_with_output().await.map_err(|source| StageError::Spawn {
        stage: stage.to_string(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(StageError::NonZeroExit {
            stage: stage.to_string(),
            status: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        });
    }

    Ok(StageOutcome { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        f.set_permissions(perms).unwrap();
    }

    #[tokio::test]
    async fn finds_bare_script_over_sh_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "pre-backup-lock", "#!/bin/sh\necho ok\n");
        let out = run_stage(
            dir.path().to_str().unwrap(),
            "pre-backup-lock",
            &[],
            &HashMap::new(),
        )
        .await
        .unwrap();
        assert_eq!(out.stdout.trim(), "ok");
    }

    #[tokio::test]
    async fn falls_back_to_sh_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "backup.sh", "#!/bin/sh\necho fromsh\n");
        let out = run_stage(dir.path().to_str().unwrap(), "backup", &[], &HashMap::new())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "fromsh");
    }

    #[tokio::test]
    async fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_stage(dir.path().to_str().unwrap(), "backup", &[], &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::NoScript(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "backup", "#!/bin/sh\necho oops 1>&2\nexit 3\n");
        let err = run_stage(dir.path().to_str().unwrap(), "backup", &[], &HashMap::new())
            .await
            .unwrap_err();
        match err {
            StageError::NonZeroExit { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn redaction_masks_only_named_indices() {
        let args = vec!["host".to_string(), "user".to_string(), "secret".to_string()];
        let out = redacted_args(&args, &[2]);
        assert_eq!(out[0], "host");
        assert_eq!(out[1], "user");
        assert_eq!(out[2], backup_agent_common::REDACTED);
    }
}
