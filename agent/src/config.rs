/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Environment-derived configuration. The agent takes no config file;
//! every setting is read from the process environment at startup, the
//! way the original backup agent did, and a bad value is fatal rather
//! than silently defaulted.

use std::env;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub client_username: String,
    pub client_password: String,
    pub client_port: u16,
    pub scripts_path: String,
    pub directory_backup: String,
    pub directory_restore: String,
    pub allowed_to_delete_files: bool,
    pub skip_storage: bool,
    pub max_job_number: usize,
}

const DEFAULT_SCRIPTS_PATH: &str = "/var/vcap/jobs/backup-agent/backup";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_JOBS: usize = 10;

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => bail!("{key} must be a boolean, got {other:?}"),
        },
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let client_username = env::var("client_username")
            .context("client_username must be set")?;
        let client_password = env::var("client_password")
            .context("client_password must be set")?;

        let client_port = match env::var("client_port") {
            Err(_) => DEFAULT_PORT,
            Ok(v) => v
                .parse::<u16>()
                .with_context(|| format!("client_port must be a valid port, got {v:?}"))?,
        };
        if client_port == 0 {
            bail!("client_port must be nonzero");
        }

        let scripts_path =
            env::var("scripts_path").unwrap_or_else(|_| DEFAULT_SCRIPTS_PATH.to_string());

        let directory_backup = env::var("directory_backup")
            .context("directory_backup must be set")?;
        let directory_restore = env::var("directory_restore")
            .context("directory_restore must be set")?;

        let allowed_to_delete_files = env_bool("allowed_to_delete_files", false)?;
        let skip_storage = env_bool("skip_storage", false)?;

        let max_job_number = match env::var("max_job_number") {
            Err(_) => DEFAULT_MAX_JOBS,
            Ok(v) => {
                let n = v
                    .parse::<i64>()
                    .with_context(|| format!("max_job_number must be an integer, got {v:?}"))?;
                if n < 1 {
                    bail!("max_job_number must be >= 1, got {n}");
                }
                n as usize
            }
        };

        Ok(Config {
            client_username,
            client_password,
            client_port,
            scripts_path,
            directory_backup,
            directory_restore,
            allowed_to_delete_files,
            skip_storage,
            max_job_number,
        })
    }

    /// Render the startup banner, with the password redacted.
    pub fn dump(&self) -> String {
        format!(
            "client_username={}\nclient_password={}\nclient_port={}\nscripts_path={}\n\
             directory_backup={}\ndirectory_restore={}\nallowed_to_delete_files={}\n\
             skip_storage={}\nmax_job_number={}",
            self.client_username,
            backup_agent_common::redact(&self.client_password),
            self.client_port,
            self.scripts_path,
            self.directory_backup,
            self.directory_restore,
            self.allowed_to_delete_files,
            self.skip_storage,
            self.max_job_number,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Guards env var mutation across tests in this module; `env::set_var`
    // is process-global and the test harness runs tests concurrently.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for k in [
            "client_username",
            "client_password",
            "client_port",
            "scripts_path",
            "directory_backup",
            "directory_restore",
            "allowed_to_delete_files",
            "skip_storage",
            "max_job_number",
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn rejects_missing_required_fields() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_all();
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn applies_defaults() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("client_username", "admin");
        env::set_var("client_password", "hunter2");
        env::set_var("directory_backup", "/tmp/backup");
        env::set_var("directory_restore", "/tmp/restore");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.client_port, DEFAULT_PORT);
        assert_eq!(cfg.scripts_path, DEFAULT_SCRIPTS_PATH);
        assert_eq!(cfg.max_job_number, DEFAULT_MAX_JOBS);
        assert!(!cfg.allowed_to_delete_files);
        assert!(!cfg.skip_storage);
        clear_all();
    }

    #[test]
    fn rejects_zero_port() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("client_username", "admin");
        env::set_var("client_password", "hunter2");
        env::set_var("directory_backup", "/tmp/backup");
        env::set_var("directory_restore", "/tmp/restore");
        env::set_var("client_port", "0");

        assert!(Config::from_env().is_err());
        clear_all();
    }

    #[test]
    fn dump_redacts_password() {
        let cfg = Config {
            client_username: "admin".into(),
            client_password: "hunter2".into(),
            client_port: 8000,
            scripts_path: DEFAULT_SCRIPTS_PATH.into(),
            directory_backup: "/tmp/backup".into(),
            directory_restore: "/tmp/restore".into(),
            allowed_to_delete_files: false,
            skip_storage: false,
            max_job_number: 10,
        };
        let dump = cfg.dump();
        assert!(!dump.contains("hunter2"));
        assert!(dump.contains(backup_agent_common::REDACTED));
    }
}
