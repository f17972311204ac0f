/*!
 * Typed request-scoped identity for handlers
 *
 * Public API:
 * - CurrentIdentity (protected routes)
 * - MaybeIdentity (routes that may be public)
 */
mod identity;

pub use identity::{CurrentIdentity, MaybeIdentity};
