/*
 * Responsibility
 * - HTTP surface: routing table, its access policy, handlers, extractors, DTOs
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{policy, routes};
