/*
 * Copyright 2026 Backup Agent Contributors
 */

use slog::o;

use super::auth;
use super::prelude::*;
use crate::registry::{JobKind, JobStatus};
use crate::types::{BackupRequest, DestinationKind, IdBody};

#[derive(Deserialize, JsonSchema)]
pub(crate) struct BackupIdPath {
    id: String,
}

#[endpoint {
    method = POST,
    path = "/backup",
}]
pub(crate) async fn backup_create(
    rqctx: RequestContext<Arc<Central>>,
    body: TypedBody<BackupRequest>,
) -> DSResult<Response<Body>> {
    let c = rqctx.context();
    auth::check(c, &rqctx)?;
    let req = body.into_inner();

    if req.id.is_empty() {
        return Err(HttpError::for_client_error(
            None,
            StatusCode::BAD_REQUEST,
            "id must not be empty".into(),
        ));
    }

    if let Some(existing) = c.registry.get(JobKind::Backup, &req.id) {
        return json_response(StatusCode::CONFLICT, &existing);
    }

    let missing = req.missing_fields();
    if !missing.is_empty() {
        persist_validation_failure(c, &req.id, &missing);
        return Err(HttpError::for_client_error(
            None,
            StatusCode::BAD_REQUEST,
            format!("missing required fields: {}", missing.join(", ")),
        ));
    }

    if matches!(req.destination.kind, DestinationKind::Unknown) {
        return Err(HttpError::for_client_error(
            None,
            StatusCode::BAD_REQUEST,
            "unsupported destination type".into(),
        ));
    }

    if !c.registry.try_admit() {
        return Err(HttpError::for_client_error(
            None,
            StatusCode::TOO_MANY_REQUESTS,
            "maximum number of in-flight jobs reached".into(),
        ));
    }

    let record = match c.registry.create(&req.id, JobKind::Backup) {
        Ok(r) => r,
        Err(_) => {
            c.registry.release();
            let existing = c.registry.get(JobKind::Backup, &req.id).unwrap();
            return json_response(StatusCode::CONFLICT, &existing);
        }
    };

    let registry = c.registry.clone();
    let config = c.config.clone();
    let log = rqctx.log.new(o!("job_id" => req.id.clone(), "kind" => "backup"));
    let id = req.id.clone();
    info!(rqctx.log, "admitted backup job"; "id" => &id);
    tokio::spawn(crate::backup::run(registry, config, log, req));

    json_response(StatusCode::CREATED, &record)
}

#[endpoint {
    method = GET,
    path = "/backup/{id}",
}]
pub(crate) async fn backup_get(
    rqctx: RequestContext<Arc<Central>>,
    path: TypedPath<BackupIdPath>,
) -> DSResult<HttpResponseOk<crate::registry::JobRecord>> {
    let c = rqctx.context();
    auth::check(c, &rqctx)?;
    let p = path.into_inner();

    match c.registry.get(JobKind::Backup, &p.id) {
        Some(record) => Ok(HttpResponseOk(record)),
        None => Err(HttpError::for_client_error(
            None,
            StatusCode::NOT_FOUND,
            format!("no backup job {}", p.id),
        )),
    }
}

#[endpoint {
    method = DELETE,
    path = "/backup",
}]
pub(crate) async fn backup_delete(
    rqctx: RequestContext<Arc<Central>>,
    body: TypedBody<IdBody>,
) -> DSResult<HttpResponseOk<MessageBody>> {
    let c = rqctx.context();
    auth::check(c, &rqctx)?;
    let id = body.into_inner().id;

    match c.registry.get(JobKind::Backup, &id) {
        Some(record) if record.status == JobStatus::Running => Err(HttpError::for_client_error(
            None,
            StatusCode::CONFLICT,
            "job is still running".into(),
        )),
        Some(_) => {
            c.registry.remove(JobKind::Backup, &id);
            Ok(HttpResponseOk(MessageBody::new("removed")))
        }
        None => Err(HttpError::for_client_error(
            None,
            StatusCode::GONE,
            format!("no backup job {id}"),
        )),
    }
}

fn persist_validation_failure(c: &Central, id: &str, missing: &[&str]) {
    if let Ok(mut record) = c.registry.create(id, JobKind::Backup) {
        record.status = JobStatus::Failed;
        record.current_stage = "validation".to_string();
        record.error_message = Some(format!("missing required fields: {}", missing.join(", ")));
        record.end_time = Some(chrono::Utc::now());
        let _ = c.registry.update(JobKind::Backup, id, record);
    }
}
