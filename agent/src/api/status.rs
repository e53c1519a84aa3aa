/*
 * Copyright 2026 Backup Agent Contributors
 */

use super::prelude::*;

#[endpoint {
    method = GET,
    path = "/status",
}]
pub(crate) async fn status(
    rqctx: RequestContext<Arc<Central>>,
) -> DSResult<HttpResponseOk<MessageBody>> {
    let c = rqctx.context();
    super::auth::check(c, &rqctx)?;

    Ok(HttpResponseOk(MessageBody::new("Client is running")))
}
