/*
 * Copyright 2026 Backup Agent Contributors
 */

use std::process::exit;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use dropshot::{ApiDescription, ConfigDropshot, HttpServerStarter};
use getopts::Options;
use slog::{info, Logger};

use backup_agent_common::make_log;

mod api;
mod backup;
mod config;
mod gateway;
mod registry;
mod restore;
mod stage;
mod types;

use config::Config;
use registry::Registry;

pub(crate) struct Central {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<Registry>,
}

trait ApiResultEx {
    fn api_check(&self) -> Result<()>;
}

impl ApiResultEx for std::result::Result<(), String> {
    fn api_check(&self) -> Result<()> {
        self.as_ref().map_err(|e| anyhow!("API registration failure: {}", e))?;
        Ok(())
    }
}

fn register_api() -> Result<ApiDescription<Arc<Central>>> {
    let mut ad = ApiDescription::new();
    ad.register(api::status::status).api_check()?;
    ad.register(api::backup::backup_create).api_check()?;
    ad.register(api::backup::backup_get).api_check()?;
    ad.register(api::backup::backup_delete).api_check()?;
    ad.register(api::restore::restore_create).api_check()?;
    ad.register(api::restore::restore_get).api_check()?;
    ad.register(api::restore::restore_delete).api_check()?;
    Ok(ad)
}

fn log_startup_banner(log: &Logger, config: &Config) {
    for line in config.dump().lines() {
        info!(log, "{}", line);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut opts = Options::new();
    opts.optopt("b", "", "bind address:port", "BIND_ADDRESS");
    opts.optopt("S", "", "dump OpenAPI schema to FILE and exit", "FILE");

    let matches = match opts.parse(std::env::args().skip(1)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("ERROR: usage: {e}");
            eprintln!("       {}", opts.usage("usage"));
            exit(1);
        }
    };

    let ad = register_api()?;

    if let Some(path) = matches.opt_str("S") {
        let mut f = std::fs::OpenOptions::new().create_new(true).write(true).open(&path)?;
        ad.openapi("Backup Agent", "1.0").write(&mut f)?;
        return Ok(());
    }

    let config = match Config::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("ERROR: invalid configuration: {e:?}");
            exit(1);
        }
    };

    let log = make_log("backup-agent");
    log_startup_banner(&log, &config);

    let registry = Arc::new(Registry::new(config.max_job_number));
    let central = Arc::new(Central { config: config.clone(), registry });

    let bind_address = matches
        .opt_str("b")
        .unwrap_or_else(|| format!("0.0.0.0:{}", config.client_port))
        .parse()?;

    let server = HttpServerStarter::new(
        &ConfigDropshot { bind_address, request_body_max_bytes: 16 * 1024 * 1024, ..Default::default() },
        ad,
        central,
        &log,
    )
    .map_err(|e| anyhow!("server startup failure: {:?}", e))?;

    let server_task = server.start();
    server_task.await.map_err(|e| anyhow!("server stopped early: {}", e))?;
    bail!("server exited without error");
}
