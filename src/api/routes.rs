/*
 * Responsibility
 * - URL structure of the gateway
 * - The access policy of each route, kept next to the route it guards
 */
use axum::{
    Router,
    http::Method,
    routing::{get, put},
};

use crate::config::AccessRules;
use crate::services::auth::{RolePredicate, RoutePolicy};
use crate::state::AppState;

use crate::api::handlers::{
    health::health,
    me::me,
    missions::{create_mission, delete_mission, list_missions, update_mission},
};

const HEALTH: &str = "/healthz";
const ME: &str = "/me";
const MISSIONS: &str = "/missions";
const MISSION: &str = "/missions/{id}";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(HEALTH, get(health))
        .route(ME, get(me))
        .route(MISSIONS, get(list_missions).post(create_mission))
        .route(MISSION, put(update_mission).delete(delete_mission))
}

/// Access policy for every route in `routes()`.
pub fn policy(access: &AccessRules) -> RoutePolicy {
    let writers = RolePredicate::any_of(access.write_roles.iter().cloned());

    let policy = RoutePolicy::new()
        .public(Method::GET, HEALTH)
        .protect(Method::GET, ME, RolePredicate::authenticated())
        .protect(Method::POST, MISSIONS, writers.clone())
        .protect(Method::PUT, MISSION, writers.clone())
        .protect(Method::DELETE, MISSION, writers);

    if access.public_read {
        policy.public(Method::GET, MISSIONS)
    } else {
        policy.protect(
            Method::GET,
            MISSIONS,
            RolePredicate::any_of(access.read_roles.iter().cloned()),
        )
    }
}
