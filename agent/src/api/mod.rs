/*
 * Copyright 2026 Backup Agent Contributors
 */

//! HTTP Surface: thin dropshot façade around the registry and
//! orchestrators. Every handler authenticates, does the minimum
//! validation needed to decide whether to touch the registry, and
//! returns immediately; none of them wait on an orchestrator.

pub(crate) mod auth;
pub(crate) mod backup;
pub(crate) mod restore;
pub(crate) mod status;

pub(crate) mod prelude {
    pub(crate) use std::result::Result as SResult;
    pub(crate) use std::sync::Arc;

    pub(crate) use dropshot::{
        endpoint, HttpError, HttpResponseOk, Path as TypedPath, RequestContext, TypedBody,
    };
    pub(crate) use hyper::{Body, Response, StatusCode};
    pub(crate) use schemars::JsonSchema;
    pub(crate) use serde::{Deserialize, Serialize};
    pub(crate) use slog::{error, info, warn};

    pub(crate) use crate::Central;

    pub(crate) type DSResult<T> = SResult<T, HttpError>;

    pub(crate) fn unauth_response<T>() -> DSResult<T> {
        Err(HttpError::for_client_error(
            None,
            StatusCode::UNAUTHORIZED,
            "Unauthorised.".into(),
        ))
    }

    pub(crate) fn json_response<T: Serialize>(
        status: StatusCode,
        body: &T,
    ) -> DSResult<Response<Body>> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| HttpError::for_internal_error(format!("serialisation error: {e}")))?;
        Response::builder()
            .status(status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .map_err(|e| HttpError::for_internal_error(format!("response build error: {e}")))
    }

    #[derive(Serialize, JsonSchema)]
    pub(crate) struct MessageBody {
        pub message: String,
    }

    impl MessageBody {
        pub(crate) fn new(message: impl Into<String>) -> Self {
            MessageBody { message: message.into() }
        }
    }
}
