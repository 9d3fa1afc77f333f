use crate::utils::auth::Caller;
use axum::{extract::Request, middleware::Next, response::Response};

/// Attaches the caller's credentials to the request.
///
/// Nothing is rejected here: the host platform's dataset lookup, done by every
/// handler before touching the staging area, is where access is decided.
pub async fn caller_middleware(mut req: Request, next: Next) -> Response {
    let caller = Caller::from_headers(req.headers());
    if caller.api_key.is_none() {
        tracing::debug!("Request without credentials: {}", req.uri());
    }
    req.extensions_mut().insert(caller);
    next.run(req).await
}
