//! Bearer token verification against the provider's signing key set.
//!
//! `verify` is a pure function of (token, key set, now). `verify_with_refresh` adds the one
//! permitted side effect: when the token names a key the set does not hold, ask the key
//! source for a fresh set and verify exactly once more.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{crypto, decode_header};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::discovery::KeySource;
use super::identity::{IdentityRecord, RoleClaimPath};
use super::keys::{KeyMatch, SigningKeySet};

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("no signing key for kid {kid:?}")]
    UnknownKey { kid: Option<String> },
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("claims undecodable")]
    ClaimsUndecodable,
}

impl VerificationError {
    /// Failure category reported to clients.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::Malformed => "malformed_header",
            Self::UnknownKey { .. } | Self::SignatureInvalid => "signature_invalid",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
            Self::ClaimsUndecodable => "claims_undecodable",
        }
    }
}

pub type VerificationOutcome = Result<IdentityRecord, VerificationError>;

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    leeway_seconds: i64,
    roles_claim: RoleClaimPath,
}

impl TokenVerifier {
    pub fn new(leeway_seconds: u64, roles_claim: RoleClaimPath) -> Self {
        Self {
            leeway_seconds: i64::try_from(leeway_seconds).unwrap_or(i64::MAX),
            roles_claim,
        }
    }

    /// Verifies `token` against `keys` at unix time `now`.
    pub fn verify(&self, token: &str, keys: &SigningKeySet, now: i64) -> VerificationOutcome {
        let token = token.trim();
        if token.is_empty() {
            return Err(VerificationError::MissingToken);
        }

        // 1) Structure. Nothing below runs on a token that is not three base64url segments.
        let segments = Segments::split(token)?;
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "token header does not decode");
            VerificationError::Malformed
        })?;

        // 2) An expired token is refused as expired whatever its signature.
        if let Some(exp) = unverified_expiry(segments.payload)
            && now > exp.saturating_add(self.leeway_seconds)
        {
            return Err(VerificationError::Expired);
        }

        // 3) Key lookup by the declared kid only.
        if !keys.allows(header.alg) {
            debug!(alg = ?header.alg, "token algorithm not accepted by provider");
            return Err(VerificationError::SignatureInvalid);
        }
        let key = match keys.find(header.kid.as_deref(), header.alg) {
            KeyMatch::Found(key) => key,
            KeyMatch::Missing => return Err(VerificationError::UnknownKey { kid: header.kid }),
            KeyMatch::AlgorithmMismatch | KeyMatch::Ambiguous => {
                return Err(VerificationError::SignatureInvalid);
            }
        };

        // 4) Signature over `header.payload`.
        match crypto::verify(
            segments.signature,
            segments.signing_input.as_bytes(),
            key.decoding_key(),
            header.alg,
        ) {
            Ok(true) => {}
            Ok(false) => return Err(VerificationError::SignatureInvalid),
            Err(e) => {
                debug!(error = %e, "signature check errored");
                return Err(VerificationError::SignatureInvalid);
            }
        }

        // 5..8) Claims, in order: issuer, audience, validity window, then the rest.
        let Some(Value::Object(claims)) = decode_segment(segments.payload)
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        else {
            return Err(VerificationError::ClaimsUndecodable);
        };

        if claims.get("iss").and_then(Value::as_str) != Some(keys.issuer()) {
            return Err(VerificationError::IssuerMismatch);
        }

        let audience = claims
            .get("aud")
            .and_then(|aud| Audience::deserialize(aud).ok());
        if !audience.is_some_and(|aud| aud.contains(keys.audience())) {
            return Err(VerificationError::AudienceMismatch);
        }

        let exp = numeric_claim(&claims, "exp")?.ok_or(VerificationError::ClaimsUndecodable)?;
        if now > exp.saturating_add(self.leeway_seconds) {
            return Err(VerificationError::Expired);
        }
        if let Some(nbf) = numeric_claim(&claims, "nbf")?
            && now.saturating_add(self.leeway_seconds) < nbf
        {
            return Err(VerificationError::NotYetValid);
        }

        let subject = match claims.get("sub") {
            Some(Value::String(sub)) if !sub.trim().is_empty() => sub.clone(),
            _ => return Err(VerificationError::ClaimsUndecodable),
        };
        let expires_at =
            DateTime::<Utc>::from_timestamp(exp, 0).ok_or(VerificationError::ClaimsUndecodable)?;

        Ok(IdentityRecord::new(
            subject,
            keys.issuer().to_string(),
            expires_at,
            claims,
            &self.roles_claim,
        ))
    }

    /// Verifies against the source's current keys, refreshing them once if the token names
    /// a key the set does not hold.
    pub async fn verify_with_refresh(
        &self,
        token: &str,
        source: &dyn KeySource,
    ) -> VerificationOutcome {
        let keys = source.current_keys();

        let kid = match self.verify(token, &keys, Utc::now().timestamp()) {
            Err(VerificationError::UnknownKey { kid }) => kid,
            outcome => return outcome,
        };

        info!(?kid, generation = keys.generation(), "signing key not in key set, refreshing");
        let refreshed = match source.refresh(&keys).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                warn!(?kid, error = %err, "key set refresh failed");
                return Err(VerificationError::SignatureInvalid);
            }
        };

        match self.verify(token, &refreshed, Utc::now().timestamp()) {
            Err(VerificationError::UnknownKey { .. }) => Err(VerificationError::SignatureInvalid),
            outcome => outcome,
        }
    }
}

struct Segments<'a> {
    signing_input: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> Segments<'a> {
    fn split(token: &'a str) -> Result<Self, VerificationError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerificationError::Malformed);
        };

        if [header, payload, signature]
            .iter()
            .any(|segment| decode_segment(segment).is_none_or(|bytes| bytes.is_empty()))
        {
            return Err(VerificationError::Malformed);
        }

        Ok(Self {
            signing_input: &token[..header.len() + 1 + payload.len()],
            payload,
            signature,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).ok()
}

fn numeric_date(value: f64) -> i64 {
    value.floor() as i64
}

/// `None` when absent or null. Any other non-number is undecodable.
fn numeric_claim(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>, VerificationError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(|v| Some(numeric_date(v)))
            .ok_or(VerificationError::ClaimsUndecodable),
    }
}

fn unverified_expiry(payload: &str) -> Option<i64> {
    let bytes = decode_segment(payload)?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp").and_then(Value::as_f64).map(numeric_date)
}
