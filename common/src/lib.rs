/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Shared, ambient-stack helpers used by the backup/restore agent: log
//! setup, credential redaction, and timestamp formatting. Nothing in here
//! is specific to jobs, stages, or object storage; that lives in `agent`.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use slog::Drain;

pub const REDACTED: &str = "<redacted>";

/// Build the root logger for a named component.
///
/// Defaults to a human-readable terminal format; set `log_format=bunyan`
/// in the environment to switch to newline-delimited JSON instead, which
/// is how the teacher's stack lets log aggregation swap formats without a
/// rebuild.
pub fn make_log(name: &str) -> slog::Logger {
    let bunyan = std::env::var("log_format")
        .map(|v| v.eq_ignore_ascii_case("bunyan"))
        .unwrap_or(false);

    let drain = if bunyan {
        let drain = slog_bunyan::default(std::io::stdout());
        slog::Logger::root(Mutex::new(drain).fuse(), slog::o!("name" => name.to_string()))
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = Mutex::new(drain).fuse();
        slog::Logger::root(drain, slog::o!("name" => name.to_string()))
    };

    drain
}

/// Redact a value that must never reach logs: passwords, encryption keys,
/// auth secrets. The real value is still used for the child process
/// environment or the upstream request; only the log line is affected.
pub fn redact(_value: &str) -> &'static str {
    REDACTED
}

/// Render a timestamp the way the agent's object keys expect:
/// `YYYY_MM_DD_HH_MM`, always in UTC.
pub fn compact_utc_stamp(t: DateTime<Utc>) -> String {
    t.format("%Y_%m_%d_%H_%M").to_string()
}
