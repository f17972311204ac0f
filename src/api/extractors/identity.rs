use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::IdentityRecord;

/// Identity of the caller on a protected route.
///
/// The access middleware inserts it into the request extensions after verification.
/// Missing means the route was not wired through the middleware; answer 401 rather than
/// run the handler anonymously.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Arc<IdentityRecord>);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<IdentityRecord>>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or(AppError::unauthorized("missing_token"))
    }
}

/// Identity if there is one. `None` exactly on public routes.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Arc<IdentityRecord>>);

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(
            parts.extensions.get::<Arc<IdentityRecord>>().cloned(),
        ))
    }
}
