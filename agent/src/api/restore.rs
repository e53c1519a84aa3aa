/*
 * Copyright 2026 Backup Agent Contributors
 */

use slog::o;

use super::auth;
use super::prelude::*;
use crate::registry::{JobKind, JobStatus};
use crate::types::{DestinationKind, IdBody, RestoreRequest};

#[derive(Deserialize, JsonSchema)]
pub(crate) struct RestoreIdPath {
    id: String,
}

#[endpoint {
    method = PUT,
    path = "/restore",
}]
pub(crate) async fn restore_create(
    rqctx: RequestContext<Arc<Central>>,
    body: TypedBody<RestoreRequest>,
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

    if let Some(existing) = c.registry.get(JobKind::Restore, &req.id) {
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

    let record = match c.registry.create(&req.id, JobKind::Restore) {
        Ok(r) => r,
        Err(_) => {
            c.registry.release();
            let existing = c.registry.get(JobKind::Restore, &req.id).unwrap();
            return json_response(StatusCode::CONFLICT, &existing);
        }
    };

    let registry = c.registry.clone();
    let config = c.config.clone();
    let log = rqctx.log.new(o!("job_id" => req.id.clone(), "kind" => "restore"));
    let id = req.id.clone();
    info!(rqctx.log, "admitted restore job"; "id" => &id);
    tokio::spawn(crate::restore::run(registry, config, log, req));

    json_response(StatusCode::CREATED, &record)
}

#[endpoint {
    method = GET,
    path = "/restore/{id}",
}]
pub(crate) async fn restore_get(
    rqctx: RequestContext<Arc<Central>>,
    path: TypedPath<RestoreIdPath>,
) -> DSResult<HttpResponseOk<crate::registry::JobRecord>> {
    let c = rqctx.context();
    auth::check(c, &rqctx)?;
    let p = path.into_inner();

    match c.registry.get(JobKind::Restore, &p.id) {
        Some(record) => Ok(HttpResponseOk(record)),
        None => Err(HttpError::for_client_error(
            None,
            StatusCode::NOT_FOUND,
            format!("no restore job {}", p.id),
        )),
    }
}

#[endpoint {
    method = DELETE,
    path = "/restore",
}]
pub(crate) async fn restore_delete(
    rqctx: RequestContext<Arc<Central>>,
    body: TypedBody<IdBody>,
) -> DSResult<HttpResponseOk<MessageBody>> {
    let c = rqctx.context();
    auth::check(c, &rqctx)?;
    let id = body.into_inner().id;

    match c.registry.get(JobKind::Restore, &id) {
        Some(record) if record.status == JobStatus::Running => Err(HttpError::for_client_error(
            None,
            StatusCode::CONFLICT,
            "job is still running".into(),
        )),
        Some(_) => {
            c.registry.remove(JobKind::Restore, &id);
            Ok(HttpResponseOk(MessageBody::new("removed")))
        }
        None => Err(HttpError::for_client_error(
            None,
            StatusCode::GONE,
            format!("no restore job {id}"),
        )),
    }
}

fn persist_validation_failure(c: &Central, id: &str, missing: &[&str]) {
    if let Ok(mut record) = c.registry.create(id, JobKind::Restore) {
        record.status = JobStatus::Failed;
        record.current_stage = "validation".to_string();
        record.error_message = Some(format!("missing required fields: {}", missing.join(", ")));
        record.end_time = Some(chrono::Utc::now());
        let _ = c.registry.update(JobKind::Restore, id, record);
    }
}
