/*
 * Copyright 2026 Backup Agent Contributors
 */

//! S3 (and S3-compatible) transfer. A fresh client is built per request
//! from the destination's own credentials rather than a process-wide
//! one, since every job may point at a different account or endpoint.

use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::ProvideErrorMetadata;

use super::GatewayError;
use crate::types::DestinationKind;

/// Parse the destination's endpoint, if any, against its `skip_ssl`
/// flag and return the host-only endpoint the client should be built
/// with (dropshot's documented S3 contract: the client is always handed
/// a host-only endpoint, never a scheme-qualified one).
///
/// - No endpoint at all: use the default AWS endpoint (region-derived).
/// - An endpoint with an explicit scheme: the scheme must agree with
///   `skip_ssl` (`https` <=> skip_ssl=false, `http` <=> skip_ssl=true);
///   mismatch is a fatal `EndpointSchemeMismatch`.
/// - A bare host, with no scheme: treated as the host, joined with the
///   scheme implied by `skip_ssl`.
fn resolve_endpoint(endpoint: &Option<String>, skip_ssl: bool) -> Result<Option<String>, GatewayError> {
    let raw = match endpoint {
        None => return Ok(None),
        Some(e) if e.is_empty() => return Ok(None),
        Some(e) => e,
    };

    let expected_scheme = if skip_ssl { "http" } else { "https" };

    if let Ok(parsed) = url::Url::parse(raw) {
        if let Some(host) = parsed.host_str() {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                // Not actually a scheme we recognise (e.g. `url` parsed a
                // bare host as a "scheme" for something like `host:port`).
                return Ok(Some(format!("{expected_scheme}://{raw}")));
            }
            if scheme != expected_scheme {
                return Err(GatewayError::EndpointSchemeMismatch(raw.clone()));
            }
            let host_only = match parsed.port() {
                Some(p) => format!("{host}:{p}"),
                None => host.to_string(),
            };
            return Ok(Some(format!("{expected_scheme}://{host_only}")));
        }
    }

    // Bare host, no scheme at all.
    Ok(Some(format!("{expected_scheme}://{raw}")))
}

fn client_for(kind: &DestinationKind) -> Result<aws_sdk_s3::Client, GatewayError> {
    let DestinationKind::S3 { region, endpoint, auth_key, auth_secret, skip_ssl, .. } = kind else {
        return Err(GatewayError::UnsupportedType);
    };

    let endpoint_url = resolve_endpoint(endpoint, *skip_ssl)?;

    let creds = Credentials::new(auth_key, auth_secret, None, None, "backup-agent");
    let mut builder = aws_sdk_s3::Config::builder()
        .region(Region::new(region.clone()))
        .credentials_provider(creds);
    if let Some(url) = endpoint_url {
        builder = builder.endpoint_url(url);
    }
    Ok(aws_sdk_s3::Client::from_conf(builder.build()))
}

async fn ensure_bucket(client: &aws_sdk_s3::Client, bucket: &str) -> Result<(), GatewayError> {
    match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => Ok(()),
        Err(err) => {
            // `into_service_error()` panics on a dispatch/timeout/construction
            // failure (e.g. an unreachable or mis-schemed endpoint); those
            // never carry a service error, so check with `as_service_error`
            // first rather than unwrapping into a panic that would abort this
            // orchestrator task before `finalize`/`release` run.
            match err.as_service_error() {
                Some(svc_err) => {
                    let not_found = matches!(svc_err.code(), Some("NotFound") | Some("404"));
                    if not_found {
                        Err(GatewayError::BucketMissing(bucket.to_string()))
                    } else {
                        Err(GatewayError::AccessFailed(bucket.to_string(), svc_err.to_string()))
                    }
                }
                None => Err(GatewayError::AccessFailed(bucket.to_string(), err.to_string())),
            }
        }
    }
}

pub async fn upload(
    local_path: &std::path::Path,
    object_name: &str,
    kind: &DestinationKind,
) -> Result<super::UploadOutcome, GatewayError> {
    let DestinationKind::S3 { bucket, filename_prefix, .. } = kind else {
        return Err(GatewayError::UnsupportedType);
    };
    let client = client_for(kind)?;
    ensure_bucket(&client, bucket).await?;

    let key = match filename_prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{object_name}"),
        _ => object_name.to_string(),
    };

    let body = aws_smithy_http::byte_stream::ByteStream::from_path(local_path)
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;
    let size = std::fs::metadata(local_path)
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?
        .len() as i64;

    client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(body)
        .send()
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;

    Ok(super::UploadOutcome { filename: object_name.to_string(), size })
}

pub async fn download(
    object_name: &str,
    local_path: &std::path::Path,
    kind: &DestinationKind,
) -> Result<(), GatewayError> {
    let DestinationKind::S3 { bucket, .. } = kind else {
        return Err(GatewayError::UnsupportedType);
    };
    let client = client_for(kind)?;
    ensure_bucket(&client, bucket).await?;

    let mut obj = client
        .get_object()
        .bucket(bucket)
        .key(object_name)
        .send()
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;

    let mut file = tokio::fs::File::create(local_path)
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;
    use tokio::io::AsyncWriteExt;
    while let Some(chunk) = obj
        .body
        .try_next()
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_is_none() {
        assert_eq!(resolve_endpoint(&None, false).unwrap(), None);
    }

    #[test]
    fn scheme_must_agree_with_skip_ssl() {
        let endpoint = Some("https://minio.internal:9000".to_string());
        assert!(resolve_endpoint(&endpoint, true).is_err());
        assert!(resolve_endpoint(&endpoint, false).is_ok());
    }

    #[test]
    fn bare_host_gets_scheme_from_skip_ssl() {
        let endpoint = Some("minio.internal:9000".to_string());
        let resolved = resolve_endpoint(&endpoint, true).unwrap().unwrap();
        assert_eq!(resolved, "http://minio.internal:9000");
    }

    #[test]
    fn resolved_endpoint_strips_path() {
        let endpoint = Some("https://minio.internal".to_string());
        let resolved = resolve_endpoint(&endpoint, false).unwrap().unwrap();
        assert_eq!(resolved, "https://minio.internal");
    }
}
