//! Role-based authorization decision.

use std::collections::BTreeSet;

use super::identity::IdentityRecord;

/// Roles allowed to invoke an operation. Holding any one of them is enough.
///
/// An empty predicate accepts every authenticated caller. There is no role hierarchy: a
/// route that should admit several roles lists each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePredicate {
    any_of: BTreeSet<String>,
}

impl RolePredicate {
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            any_of: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// No role required, only a valid token.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.any_of.iter().map(String::as_str)
    }

    pub fn is_satisfied_by(&self, roles: &BTreeSet<String>) -> bool {
        self.any_of.is_empty() || !self.any_of.is_disjoint(roles)
    }
}

pub fn authorize(identity: &IdentityRecord, predicate: &RolePredicate) -> bool {
    predicate.is_satisfied_by(identity.roles())
}
