//! Bearer token verification and role check in front of every routed handler.
//!
//! Per request: `Start → TokenExtracted → Verified → Authorized → Dispatched`.
//! Any failing step answers 401 (token problems) or 403 (role problems) and the handler
//! never runs. Public routes skip straight to `Dispatched` without looking at the header.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, Method, Request, header},
    middleware::{self, Next},
    response::Response,
};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::services::auth::{IdentityRecord, RouteAccess, VerificationError, authorize};
use crate::state::AppState;

/// Wraps every route of `router` with the access check.
///
/// Applied with `route_layer` so the check runs after routing: the matched path template is
/// known, and unknown paths still fall through to a plain 404.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

/// What the pipeline hands to the handler.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Public route; no identity.
    Anonymous,
    Authenticated(Arc<IdentityRecord>),
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let admission = admit(&state, req.method(), &route, req.headers()).await?;

    // middleware → extractor hand-off
    if let Admission::Authenticated(identity) = admission {
        req.extensions_mut().insert(identity);
    }

    Ok(next.run(req).await)
}

/// Runs the pipeline for one request and decides whether it may be dispatched.
pub async fn admit(
    state: &AppState,
    method: &Method,
    route: &str,
    headers: &HeaderMap,
) -> Result<Admission, AppError> {
    // HEAD is served by the GET handler, so it shares the GET policy.
    let policy_method = if *method == Method::HEAD {
        &Method::GET
    } else {
        method
    };
    let predicate = match state.policy.lookup(policy_method, route) {
        Some(RouteAccess::Public) => {
            debug!(%method, route, "public route, dispatching without identity");
            return Ok(Admission::Anonymous);
        }
        Some(RouteAccess::Protected(predicate)) => predicate,
        None => {
            warn!(%method, route, "route has no access policy, denying");
            return Err(AppError::Forbidden);
        }
    };

    let token = bearer_token(headers).map_err(|err| {
        warn!(%method, route, reason = err.category(), "rejecting request without usable bearer token");
        AppError::unauthorized(err.category())
    })?;
    debug!(%method, route, "token extracted");

    let identity = match state
        .verifier
        .verify_with_refresh(token, state.keys.as_ref())
        .await
    {
        Ok(identity) => identity,
        Err(err) => {
            warn!(%method, route, reason = err.category(), error = %err, "access token verification failed");
            return Err(AppError::unauthorized(err.category()));
        }
    };
    debug!(
        %method,
        route,
        sub = identity.subject(),
        iss = identity.issuer(),
        exp = %identity.expires_at(),
        "token verified"
    );

    if !authorize(&identity, predicate) {
        warn!(
            %method,
            route,
            sub = identity.subject(),
            roles = ?identity.roles(),
            required = ?predicate.roles().collect::<Vec<_>>(),
            "insufficient role"
        );
        return Err(AppError::Forbidden);
    }
    debug!(%method, route, sub = identity.subject(), "authorized");

    Ok(Admission::Authenticated(Arc::new(identity)))
}

/// Extracts the token from `Authorization: Bearer <token>`. The scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Result<&str, VerificationError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(VerificationError::MissingToken)?;
    let value = value.to_str().map_err(|_| VerificationError::Malformed)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(VerificationError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(VerificationError::Malformed);
    }

    Ok(token.trim())
}
