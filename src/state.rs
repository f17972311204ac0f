/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - key source, token verifier, route policy, mission repository
 * - Cheap to Clone (everything inside is Arc)
 */
use std::sync::Arc;

use crate::repos::mission_repo::MissionRepo;
use crate::services::auth::{KeySource, RoutePolicy, TokenVerifier};

#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<dyn KeySource>,
    pub verifier: Arc<TokenVerifier>,
    pub policy: Arc<RoutePolicy>,
    pub missions: MissionRepo,
}

impl AppState {
    pub fn new(
        keys: Arc<dyn KeySource>,
        verifier: Arc<TokenVerifier>,
        policy: RoutePolicy,
        missions: MissionRepo,
    ) -> Self {
        Self {
            keys,
            verifier,
            policy: Arc::new(policy),
            missions,
        }
    }
}
