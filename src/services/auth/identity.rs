/*
 * Responsibility
 * - The verified identity of one caller (subject, issuer, expiry, raw claims, roles)
 * - Role extraction from the provider-specific nested claim (fail closed)
 */
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Claims of a token that passed every check in `TokenVerifier::verify`.
///
/// Only the verifier constructs it. Handlers receive it behind an `Arc` and can only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRecord {
    #[serde(rename = "sub")]
    subject: String,
    #[serde(rename = "iss")]
    issuer: String,
    #[serde(rename = "exp")]
    expires_at: DateTime<Utc>,
    roles: BTreeSet<String>,
    claims: Map<String, Value>,
}

impl IdentityRecord {
    pub(crate) fn new(
        subject: String,
        issuer: String,
        expires_at: DateTime<Utc>,
        claims: Map<String, Value>,
        roles_claim: &RoleClaimPath,
    ) -> Self {
        let roles = roles_claim.extract(&claims);
        Self {
            subject,
            issuer,
            expires_at,
            roles,
            claims,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }
}

/// Where the role list lives inside the claims, e.g. `realm_access.roles` for Keycloak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleClaimPath(Vec<String>);

impl RoleClaimPath {
    /// Parses a dotted path. Empty segments are rejected.
    pub fn parse(dotted: &str) -> Option<Self> {
        let segments: Vec<String> = dotted.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self(segments))
    }

    /// Extracts the role set. Anything other than a list of strings at the end of a chain of
    /// objects yields an empty set.
    pub fn extract(&self, claims: &Map<String, Value>) -> BTreeSet<String> {
        let Some((first, rest)) = self.0.split_first() else {
            return BTreeSet::new();
        };

        let mut node = claims.get(first);
        for segment in rest {
            node = node.and_then(Value::as_object).and_then(|obj| obj.get(segment));
        }

        let Some(items) = node.and_then(Value::as_array) else {
            return BTreeSet::new();
        };

        // One non-string entry means the structure is not what we expect: grant nothing.
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<BTreeSet<_>>>()
            .unwrap_or_default()
    }
}

impl Default for RoleClaimPath {
    fn default() -> Self {
        Self(vec!["realm_access".to_string(), "roles".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn roles(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn extracts_nested_roles() {
        let path = RoleClaimPath::default();
        let c = claims(json!({ "realm_access": { "roles": ["user", "admin"] } }));

        assert_eq!(path.extract(&c), roles(&["admin", "user"]));
    }

    #[test]
    fn ordering_does_not_matter() {
        let path = RoleClaimPath::default();
        let a = claims(json!({ "realm_access": { "roles": ["b", "a", "c"] } }));
        let b = claims(json!({ "realm_access": { "roles": ["c", "b", "a", "a"] } }));

        assert_eq!(path.extract(&a), path.extract(&b));
    }

    #[test]
    fn malformed_structures_yield_no_roles() {
        let path = RoleClaimPath::default();
        let cases = [
            json!({}),
            json!({ "realm_access": null }),
            json!({ "realm_access": "admin" }),
            json!({ "realm_access": ["admin"] }),
            json!({ "realm_access": { "roles": "admin" } }),
            json!({ "realm_access": { "roles": { "admin": true } } }),
            json!({ "realm_access": { "roles": ["admin", 7] } }),
        ];

        for case in cases {
            assert!(path.extract(&claims(case.clone())).is_empty(), "{case}");
        }
    }

    #[test]
    fn custom_paths() {
        let top = RoleClaimPath::parse("groups").expect("path");
        let deep = RoleClaimPath::parse("resource_access.omc-api.roles").expect("path");
        let c = claims(json!({
            "groups": ["ops"],
            "resource_access": { "omc-api": { "roles": ["admin"] } }
        }));

        assert_eq!(top.extract(&c), roles(&["ops"]));
        assert_eq!(deep.extract(&c), roles(&["admin"]));
        assert!(RoleClaimPath::parse("realm_access..roles").is_none());
        assert!(RoleClaimPath::parse("").is_none());
    }
}
