/*
 * Responsibility
 * - GET /me: echo the verified identity of the caller
 */
use axum::Json;

use crate::api::extractors::CurrentIdentity;
use crate::services::auth::IdentityRecord;

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<IdentityRecord> {
    Json(identity.as_ref().clone())
}
