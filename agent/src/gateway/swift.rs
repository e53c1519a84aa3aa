/*
 * Copyright 2026 Backup Agent Contributors
 */

//! OpenStack Swift transfer. No Swift client crate exists in the
//! dependency corpus this agent is grown from, so this is a minimal
//! hand-rolled client atop `reqwest`: a Keystone v3 password-auth token
//! exchange, then HEAD/PUT/GET against the container.

use serde::{Deserialize, Serialize};

use super::GatewayError;
use crate::types::DestinationKind;

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    identity: Identity<'a>,
    scope: Scope<'a>,
}

#[derive(Serialize)]
struct Identity<'a> {
    methods: [&'static str; 1],
    password: PasswordMethod<'a>,
}

#[derive(Serialize)]
struct PasswordMethod<'a> {
    user: PasswordUser<'a>,
}

#[derive(Serialize)]
struct PasswordUser<'a> {
    name: &'a str,
    password: &'a str,
    domain: Domain<'a>,
}

#[derive(Serialize)]
struct Domain<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Scope<'a> {
    project: ProjectScope<'a>,
}

#[derive(Serialize)]
struct ProjectScope<'a> {
    name: &'a str,
    domain: Domain<'a>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
    interface: String,
    url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    catalog: Vec<CatalogEntry>,
}

struct Session {
    client: reqwest::Client,
    token: String,
    storage_url: String,
}

async fn authenticate(kind: &DestinationKind) -> Result<Session, GatewayError> {
    let DestinationKind::Swift { auth_url, domain, project_name, username, password, .. } = kind
    else {
        return Err(GatewayError::UnsupportedType);
    };

    let client = reqwest::Client::new();
    let body = AuthRequest {
        auth: AuthBody {
            identity: Identity {
                methods: ["password"],
                password: PasswordMethod {
                    user: PasswordUser {
                        name: username,
                        password,
                        domain: Domain { name: domain },
                    },
                },
            },
            scope: Scope {
                project: ProjectScope { name: project_name, domain: Domain { name: domain } },
            },
        },
    };

    let resp = client
        .post(format!("{}/auth/tokens", auth_url.trim_end_matches('/')))
        .json(&body)
        .send()
        .await
        .map_err(|e| GatewayError::AccessFailed("keystone".to_string(), e.to_string()))?;

    if !resp.status().is_success() {
        return Err(GatewayError::AccessFailed(
            "keystone".to_string(),
            format!("auth failed with status {}", resp.status()),
        ));
    }

    let token = resp
        .headers()
        .get("X-Subject-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            GatewayError::AccessFailed("keystone".to_string(), "missing X-Subject-Token".to_string())
        })?
        .to_string();

    let parsed: TokenResponse = resp
        .json()
        .await
        .map_err(|e| GatewayError::AccessFailed("keystone".to_string(), e.to_string()))?;

    let storage_url = parsed
        .token
        .catalog
        .into_iter()
        .find(|e| e.kind == "object-store")
        .and_then(|e| e.endpoints.into_iter().find(|ep| ep.interface == "public"))
        .map(|ep| ep.url)
        .ok_or_else(|| {
            GatewayError::AccessFailed(
                "keystone".to_string(),
                "no object-store endpoint in catalog".to_string(),
            )
        })?;

    Ok(Session { client, token, storage_url })
}

async fn ensure_container(session: &Session, container: &str) -> Result<(), GatewayError> {
    let url = format!("{}/{}", session.storage_url.trim_end_matches('/'), container);
    let resp = session
        .client
        .head(&url)
        .header("X-Auth-Token", &session.token)
        .send()
        .await
        .map_err(|e| GatewayError::AccessFailed(container.to_string(), e.to_string()))?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        Err(GatewayError::BucketMissing(container.to_string()))
    } else if !resp.status().is_success() {
        Err(GatewayError::AccessFailed(container.to_string(), resp.status().to_string()))
    } else {
        Ok(())
    }
}

pub async fn upload(
    local_path: &std::path::Path,
    object_name: &str,
    kind: &DestinationKind,
) -> Result<super::UploadOutcome, GatewayError> {
    let DestinationKind::Swift { container_name, .. } = kind else {
        return Err(GatewayError::UnsupportedType);
    };
    let session = authenticate(kind).await?;
    ensure_container(&session, container_name).await?;

    let bytes = tokio::fs::read(local_path)
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;
    let size = bytes.len() as i64;

    let url = format!(
        "{}/{}/{}",
        session.storage_url.trim_end_matches('/'),
        container_name,
        object_name
    );
    let resp = session
        .client
        .put(&url)
        .header("X-Auth-Token", &session.token)
        .body(bytes)
        .send()
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(GatewayError::TransferFailed(format!(
            "swift PUT failed with status {}",
            resp.status()
        )));
    }

    Ok(super::UploadOutcome { filename: object_name.to_string(), size })
}

pub async fn download(
    object_name: &str,
    local_path: &std::path::Path,
    kind: &DestinationKind,
) -> Result<(), GatewayError> {
    let DestinationKind::Swift { container_name, .. } = kind else {
        return Err(GatewayError::UnsupportedType);
    };
    let session = authenticate(kind).await?;
    ensure_container(&session, container_name).await?;

    let url = format!(
        "{}/{}/{}",
        session.storage_url.trim_end_matches('/'),
        container_name,
        object_name
    );
    let resp = session
        .client
        .get(&url)
        .header("X-Auth-Token", &session.token)
        .send()
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(GatewayError::TransferFailed(format!(
            "swift GET failed with status {}",
            resp.status()
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;
    tokio::fs::write(local_path, &bytes)
        .await
        .map_err(|e| GatewayError::TransferFailed(e.to_string()))?;

    Ok(())
}
