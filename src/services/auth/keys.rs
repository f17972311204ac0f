//! Signing key material published by the identity provider.
//!
//! A `SigningKeySet` is immutable. Rotation builds a new set and the discovery client swaps
//! it in whole, so readers never see a mix of old and new keys.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{Jwk, KeyAlgorithm, PublicKeyUse},
};
use serde_json::Value;
use tracing::debug;

/// One public key usable for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    kid: Option<String>,
    alg: Option<Algorithm>,
    key: DecodingKey,
}

impl VerificationKey {
    /// Builds a verification key from a JWK.
    ///
    /// Returns `None` for encryption keys, symmetric keys and anything `jsonwebtoken`
    /// cannot turn into a decoding key.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return None;
        }

        let alg = match &jwk.common.key_algorithm {
            Some(declared) => Some(signing_algorithm(declared)?),
            None => None,
        };

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| debug!(kid = ?jwk.common.key_id, error = %e, "skipping unusable jwk"))
            .ok()?;

        Some(Self {
            kid: jwk.common.key_id.clone(),
            alg,
            key,
        })
    }

    /// Parses the `keys` array of a JWKS document, skipping entries that do not parse.
    ///
    /// Providers routinely publish encryption keys next to signing keys (sometimes with
    /// algorithms `jsonwebtoken` does not model), so one odd entry must not sink the set.
    pub fn from_jwks(raw_keys: &[Value]) -> Vec<Self> {
        raw_keys
            .iter()
            .filter_map(|raw| match serde_json::from_value::<Jwk>(raw.clone()) {
                Ok(jwk) => Self::from_jwk(&jwk),
                Err(e) => {
                    debug!(error = %e, "skipping jwk that does not parse");
                    None
                }
            })
            .collect()
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    fn accepts(&self, alg: Algorithm) -> bool {
        self.alg.is_none_or(|declared| declared == alg)
    }
}

/// Result of looking a token's declared key up in the set.
pub enum KeyMatch<'a> {
    Found(&'a VerificationKey),
    /// No key carries the token's `kid` (or there is no candidate at all without a `kid`).
    Missing,
    /// The key exists but is published for a different algorithm.
    AlgorithmMismatch,
    /// The token has no `kid` and several keys could verify it.
    Ambiguous,
}

/// The provider's current public keys together with the issuer and audience they verify.
#[derive(Clone)]
pub struct SigningKeySet {
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    keys: Vec<VerificationKey>,
    generation: u64,
    etag: Option<String>,
    fetched_at: DateTime<Utc>,
}

impl SigningKeySet {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithms: Vec<Algorithm>,
        keys: Vec<VerificationKey>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithms,
            keys,
            generation: 0,
            etag: None,
            fetched_at: Utc::now(),
        }
    }

    /// Next generation carrying freshly fetched keys.
    pub fn rotated(&self, keys: Vec<VerificationKey>, etag: Option<String>) -> Self {
        Self {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            algorithms: self.algorithms.clone(),
            keys,
            generation: self.generation + 1,
            etag,
            fetched_at: Utc::now(),
        }
    }

    /// Next generation with unchanged keys (the provider answered 304 Not Modified).
    pub fn revalidated(&self) -> Self {
        let mut next = self.clone();
        next.generation += 1;
        next.fetched_at = Utc::now();
        next
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn allows(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    /// Finds the key a token declares. Only the declared key is ever considered.
    pub fn find(&self, kid: Option<&str>, alg: Algorithm) -> KeyMatch<'_> {
        match kid {
            Some(kid) => match self.keys.iter().find(|key| key.kid() == Some(kid)) {
                Some(key) if key.accepts(alg) => KeyMatch::Found(key),
                Some(_) => KeyMatch::AlgorithmMismatch,
                None => KeyMatch::Missing,
            },
            None => {
                let mut candidates = self.keys.iter().filter(|key| key.accepts(alg));
                match (candidates.next(), candidates.next()) {
                    (Some(key), None) => KeyMatch::Found(key),
                    (Some(_), Some(_)) => KeyMatch::Ambiguous,
                    (None, _) => KeyMatch::Missing,
                }
            }
        }
    }
}

impl fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material stays out of logs; kids are enough to correlate rotations.
        let kids: Vec<_> = self.keys.iter().map(VerificationKey::kid).collect();
        f.debug_struct("SigningKeySet")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithms", &self.algorithms)
            .field("kids", &kids)
            .field("generation", &self.generation)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Maps a JWK `alg` onto a signature algorithm. HMAC never comes from a public key set.
fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
