/*
 * Responsibility
 * - Domain services that do not depend on HTTP framing
 */
pub mod auth;
