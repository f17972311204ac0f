/*
 * Responsibility
 * - Public interface of the middleware layers
 */
pub mod auth;
pub mod http;
