pub mod authorize;
pub mod discovery;
pub mod factory;
pub mod identity;
pub mod keys;
pub mod policy;
pub mod verifier;

pub use authorize::{RolePredicate, authorize};
pub use discovery::{DiscoveryClient, DiscoveryError, KeySource};
pub use factory::{build_key_source, build_token_verifier};
pub use identity::{IdentityRecord, RoleClaimPath};
pub use policy::{RouteAccess, RoutePolicy};
pub use verifier::{TokenVerifier, VerificationError};
