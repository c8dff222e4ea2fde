use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::error::AppError;
use crate::policy::EndpointPolicy;

/// State handed to the guard layer of one route group
#[derive(Clone)]
pub struct Guard {
    pub state: AppState,
    pub policy: EndpointPolicy,
}

/// Peer address when the server was started with connect info
fn client_address(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Authenticates the caller, applies the route's permission and throttles,
/// then exposes the resolved `Identity` to the handler as an extension.
pub async fn guard(
    State(guard): State<Guard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Guard { state, policy } = guard;

    let identity = state.tokens.identify(request.headers())?;

    if let Err(denied) = policy.permission.check(&identity, request.method()) {
        tracing::warn!(
            endpoint = policy.name,
            method = %request.method(),
            authenticated = identity.is_authenticated(),
            "Permission denied"
        );
        return Err(denied);
    }

    let client = client_address(&request);
    state.throttles.check(policy.throttles, &identity, &client)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
