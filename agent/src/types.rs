/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Wire shapes for backup/restore requests. These are the JSON bodies
//! clients POST/PUT; the job registry's own record types live in
//! `registry.rs`.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct DatabaseDescriptor {
    pub host: String,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub parameters: Vec<HashMap<String, serde_json::Value>>,
}

impl DatabaseDescriptor {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_empty() {
            missing.push("database.host");
        }
        if self.username.is_empty() {
            missing.push("database.username");
        }
        if self.password.is_empty() {
            missing.push("database.password");
        }
        if self.database.is_empty() {
            missing.push("database.database");
        }
        missing
    }

    /// Flatten the declared parameter maps into `KEY=value` environment
    /// entries, `printf("%s=%v")`-style: scalars render plainly, anything
    /// else is stringified verbatim via its JSON form.
    pub fn env_entries(&self) -> Vec<String> {
        self.parameters
            .iter()
            .flat_map(|entry| entry.iter())
            .map(|(k, v)| format!("{}={}", k, scalar_to_env_string(v)))
            .collect()
    }
}

fn scalar_to_env_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DestinationKind {
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        auth_key: String,
        auth_secret: String,
        #[serde(default)]
        skip_ssl: bool,
        #[serde(default)]
        filename_prefix: Option<String>,
    },
    Swift {
        auth_url: String,
        domain: String,
        container_name: String,
        project_name: String,
        username: String,
        password: String,
    },
    /// Catches any `type` value we don't recognise, so the HTTP surface
    /// can report a proper 400 instead of a JSON parse failure.
    #[serde(other)]
    Unknown,
}

impl DestinationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            DestinationKind::S3 { .. } => "s3",
            DestinationKind::Swift { .. } => "swift",
            DestinationKind::Unknown => "unknown",
        }
    }

    pub fn missing_fields(&self, filename: &Option<String>, filename_required: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            DestinationKind::S3 { bucket, region, auth_key, auth_secret, .. } => {
                if bucket.is_empty() {
                    missing.push("destination.bucket");
                }
                if region.is_empty() {
                    missing.push("destination.region");
                }
                if auth_key.is_empty() {
                    missing.push("destination.auth_key");
                }
                if auth_secret.is_empty() {
                    missing.push("destination.auth_secret");
                }
            }
            DestinationKind::Swift { auth_url, domain, container_name, project_name, username, password } => {
                if auth_url.is_empty() {
                    missing.push("destination.auth_url");
                }
                if domain.is_empty() {
                    missing.push("destination.domain");
                }
                if container_name.is_empty() {
                    missing.push("destination.container_name");
                }
                if project_name.is_empty() {
                    missing.push("destination.project_name");
                }
                if username.is_empty() {
                    missing.push("destination.username");
                }
                if password.is_empty() {
                    missing.push("destination.password");
                }
            }
            DestinationKind::Unknown => missing.push("destination.type"),
        }
        if filename_required && filename.as_deref().unwrap_or_default().is_empty() {
            missing.push("destination.filename");
        }
        missing
    }
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct Destination {
    #[serde(flatten)]
    pub kind: DestinationKind,
    /// The object key to fetch. Required for restores; ignored for
    /// backups (the agent derives the upload key itself).
    #[serde(default)]
    pub filename: Option<String>,
    /// Bypasses the transfer entirely: the dump/load stage still runs,
    /// but no network call is made to the object store.
    #[serde(default)]
    pub skip_storage: bool,
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct BackupRequest {
    pub id: String,
    #[serde(default)]
    pub compression: bool,
    #[serde(default)]
    pub encryption_key: Option<String>,
    pub destination: Destination,
    pub database: DatabaseDescriptor,
}

impl BackupRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = self.destination.kind.missing_fields(&None, false);
        missing.extend(self.database.missing_fields());
        missing
    }
}

#[derive(Deserialize, JsonSchema, Debug, Clone)]
pub struct RestoreRequest {
    pub id: String,
    #[serde(default)]
    pub compression: bool,
    #[serde(default)]
    pub encryption_key: Option<String>,
    pub destination: Destination,
    pub database: DatabaseDescriptor,
}

impl RestoreRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing =
            self.destination.kind.missing_fields(&self.destination.filename, true);
        missing.extend(self.database.missing_fields());
        missing
    }
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct IdBody {
    pub id: String,
}
