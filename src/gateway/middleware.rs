// ============================================================================
// Gateway Middleware
// ============================================================================

use super::GatewayState;
use crate::auth::Claims;
use crate::metrics;
use crate::utils::extract_client_ip;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{Extensions, HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use medalstream_error::{AppError, AuthFailure};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// Admission control: one token per request from the caller's bucket.
///
/// Rejected requests never reach a handler, so no backend call is made.
pub async fn admission_control(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = caller_ip(&state, request.headers(), request.extensions());
    admit(&state, &client_ip, request.uri().path())?;

    Ok(next.run(request).await)
}

/// Bucket key for the caller: the peer address, or the forwarded client
/// address when the gateway sits behind a trusted proxy
pub(crate) fn caller_ip(state: &GatewayState, headers: &HeaderMap, extensions: &Extensions) -> String {
    let direct_ip = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    extract_client_ip(headers, direct_ip, state.settings.trust_proxy_headers)
}

/// Spend one token from `client_ip`'s bucket
pub(crate) fn admit(state: &GatewayState, client_ip: &str, path: &str) -> Result<(), AppError> {
    let Err(retry_after) = state.limiter.check(client_ip) else {
        return Ok(());
    };

    metrics::ADMISSION_REJECTED_TOTAL.inc();
    tracing::warn!(ip = %client_ip, path = %path, "Admission rejected");
    // Round up so clients never retry too early
    let retry_after_secs = retry_after
        .as_secs()
        .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
    Err(AppError::AdmissionRejected {
        retry_after_secs: retry_after_secs.max(1),
    })
}

/// Caller address as used for admission control
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

#[axum::async_trait]
impl FromRequestParts<Arc<GatewayState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(caller_ip(state, &parts.headers, &parts.extensions)))
    }
}

/// The authenticated caller of a mutating route.
///
/// `None` when access tokens are not required by configuration.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

#[axum::async_trait]
impl FromRequestParts<Arc<GatewayState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        if !state.settings.require_access_token {
            return Ok(Caller(None));
        }

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::AuthFailed(AuthFailure::MissingToken))?;

        let claims = state.sessions.verify_access(token)?;
        Ok(Caller(Some(claims)))
    }
}
