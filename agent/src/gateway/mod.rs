/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Object Store Gateway: upload/download a local file against whichever
//! destination a job names. Each destination kind gets its own client
//! type; this module only picks between them and defines the shared
//! error/outcome shapes.

pub mod s3;
pub mod swift;

use std::collections::HashMap;

use crate::types::DestinationKind;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("endpoint scheme does not match skip_ssl: {0}")]
    EndpointSchemeMismatch(String),
    #[error("bucket or container {0} does not exist")]
    BucketMissing(String),
    #[error("could not access bucket or container {0}: {1}")]
    AccessFailed(String, String),
    #[error("transfer failed: {0}")]
    TransferFailed(String),
    #[error("unsupported destination type")]
    UnsupportedType,
}

pub struct UploadOutcome {
    pub filename: String,
    pub size: i64,
}

/// Environment entries a destination contributes to a stage's child
/// process, prefixed per spec (`S3_BUCKET`, `SWIFT_CONTAINERNAME`, ...).
/// Only populated when the effective skip-storage flag is false.
pub fn destination_env(kind: &DestinationKind) -> HashMap<String, String> {
    let mut env = HashMap::new();
    match kind {
        DestinationKind::S3 { bucket, auth_key, auth_secret, filename_prefix, .. } => {
            env.insert("S3_BUCKET".to_string(), bucket.clone());
            env.insert("S3_AUTHKEY".to_string(), auth_key.clone());
            env.insert("S3_AUTHSECRET".to_string(), auth_secret.clone());
            if let Some(prefix) = filename_prefix {
                env.insert("S3_FILENAMEPREFIX".to_string(), prefix.clone());
            }
        }
        DestinationKind::Swift { auth_url, container_name, password, .. } => {
            env.insert("SWIFT_AUTHURL".to_string(), auth_url.clone());
            env.insert("SWIFT_CONTAINERNAME".to_string(), container_name.clone());
            env.insert("SWIFT_PASSWORD".to_string(), password.clone());
        }
        DestinationKind::Unknown => {}
    }
    env
}

/// Upload `local_path` under `object_name` to whichever destination is
/// named. `skip_storage` short-circuits without touching the network.
pub async fn upload(
    local_path: &std::path::Path,
    object_name: &str,
    kind: &DestinationKind,
    skip_storage: bool,
) -> Result<UploadOutcome, GatewayError> {
    if skip_storage {
        return Ok(UploadOutcome { filename: object_name.to_string(), size: 0 });
    }
    match kind {
        DestinationKind::S3 { .. } => s3::upload(local_path, object_name, kind).await,
        DestinationKind::Swift { .. } => swift::upload(local_path, object_name, kind).await,
        DestinationKind::Unknown => Err(GatewayError::UnsupportedType),
    }
}

/// Download `object_name` from the named destination into `local_path`.
/// This function itself has no skip-storage branch; `restore.rs`'s
/// transfer step short-circuits before ever calling it when skip-storage
/// is set, on the assumption that the operator has already staged the
/// file locally (e.g. for a restore rehearsal against a pre-placed dump).
pub async fn download(
    object_name: &str,
    local_path: &std::path::Path,
    kind: &DestinationKind,
) -> Result<(), GatewayError> {
    match kind {
        DestinationKind::S3 { .. } => s3::download(object_name, local_path, kind).await,
        DestinationKind::Swift { .. } => swift::download(object_name, local_path, kind).await,
        DestinationKind::Unknown => Err(GatewayError::UnsupportedType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skip_storage_short_circuits_without_touching_kind() {
        let kind = DestinationKind::Unknown;
        let out = upload(std::path::Path::new("/nonexistent"), "obj", &kind, true)
            .await
            .unwrap();
        assert_eq!(out.size, 0);
        assert_eq!(out.filename, "obj");
    }

    #[tokio::test]
    async fn unknown_destination_is_unsupported() {
        let kind = DestinationKind::Unknown;
        let err = upload(std::path::Path::new("/nonexistent"), "obj", &kind, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedType));
    }

    #[test]
    fn destination_env_prefixes_s3() {
        let kind = DestinationKind::S3 {
            bucket: "b".into(),
            region: "us-east-1".into(),
            endpoint: None,
            auth_key: "k".into(),
            auth_secret: "s".into(),
            skip_ssl: false,
            filename_prefix: None,
        };
        let env = destination_env(&kind);
        assert_eq!(env.get("S3_BUCKET").unwrap(), "b");
        assert_eq!(env.get("S3_AUTHKEY").unwrap(), "k");
        assert!(!env.contains_key("S3_FILENAMEPREFIX"));
    }
}
