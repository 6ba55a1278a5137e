//! HMAC signing of the `params` form field.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::error::{AssemblyError, SignError};
use crate::models::{AssemblyParams, Credentials};

/// Layout the service expects for `auth.expires`.
pub const EXPIRES_FORMAT: &str = "%Y/%m/%d %H:%M:%S+00:00";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
    #[default]
    Sha384,
    Sha512,
}

impl SignatureAlgorithm {
    /// Prefix used in the `signature` form field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(SignError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn hmac_hex<M: Mac + hmac::digest::KeyInit>(secret: &str, message: &str) -> Result<String, SignError> {
    let mut mac = <M as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| SignError::EmptySecret)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Lowercase hex HMAC of `serialized_params` keyed by `secret`.
pub fn sign(serialized_params: &str, secret: &str, algorithm: SignatureAlgorithm) -> Result<String, SignError> {
    if secret.is_empty() {
        return Err(SignError::EmptySecret);
    }
    match algorithm {
        SignatureAlgorithm::Sha1 => hmac_hex::<Hmac<Sha1>>(secret, serialized_params),
        SignatureAlgorithm::Sha256 => hmac_hex::<Hmac<Sha256>>(secret, serialized_params),
        SignatureAlgorithm::Sha384 => hmac_hex::<Hmac<Sha384>>(secret, serialized_params),
        SignatureAlgorithm::Sha512 => hmac_hex::<Hmac<Sha512>>(secret, serialized_params),
    }
}

/// The serialized params of one submission, with their signature when signed.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    pub params: String,
    /// `"<algorithm>:<hex>"`, absent for unsigned submissions.
    pub signature: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Produces envelopes for one set of credentials.
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    credentials: &'a Credentials,
    algorithm: SignatureAlgorithm,
    ttl: Duration,
}

impl<'a> Signer<'a> {
    pub fn new(credentials: &'a Credentials, algorithm: SignatureAlgorithm, ttl: Duration) -> Self {
        Self { credentials, algorithm, ttl }
    }

    /// Fills in `auth`, serializes `params`, and signs the exact serialized string if `signed` is set.
    pub fn envelope(&self, params: &mut AssemblyParams, signed: bool, now: DateTime<Utc>) -> Result<SignedEnvelope, AssemblyError> {
        params.auth.key = self.credentials.key.clone();

        if !signed {
            params.auth.expires = None;
            let serialized = serde_json::to_string(params)?;
            return Ok(SignedEnvelope { params: serialized, signature: None, expires_at: None });
        }

        let expires_at = now + self.ttl;
        params.auth.expires = Some(expires_at.format(EXPIRES_FORMAT).to_string());
        let serialized = serde_json::to_string(params)?;
        let digest = sign(&serialized, &self.credentials.secret, self.algorithm)?;
        Ok(SignedEnvelope {
            params: serialized,
            signature: Some(format!("{}:{}", self.algorithm.name(), digest)),
            expires_at: Some(expires_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    const FOX: &str = "The quick brown fox jumps over the lazy dog";

    fn empty_params() -> AssemblyParams {
        AssemblyParams {
            auth: Default::default(),
            steps: BTreeMap::new(),
            fields: Default::default(),
            template_id: None,
            notify_url: None,
        }
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            sign(FOX, "key", SignatureAlgorithm::Sha1).unwrap(),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
        assert_eq!(
            sign(FOX, "key", SignatureAlgorithm::Sha256).unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_signature_is_deterministic_and_byte_sensitive() {
        let params = r#"{"auth":{"key":"k"},"steps":{}}"#;
        for algo in [SignatureAlgorithm::Sha1, SignatureAlgorithm::Sha256, SignatureAlgorithm::Sha384, SignatureAlgorithm::Sha512] {
            let first = sign(params, "s3cret", algo).unwrap();
            let second = sign(params, "s3cret", algo).unwrap();
            assert_eq!(first, second);

            let altered = sign(&params.replace("\"k\"", "\"K\""), "s3cret", algo).unwrap();
            assert_ne!(first, altered);
            assert_eq!(first.len(), altered.len());
            assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_digest_lengths() {
        assert_eq!(sign(FOX, "k", SignatureAlgorithm::Sha1).unwrap().len(), 40);
        assert_eq!(sign(FOX, "k", SignatureAlgorithm::Sha256).unwrap().len(), 64);
        assert_eq!(sign(FOX, "k", SignatureAlgorithm::Sha384).unwrap().len(), 96);
        assert_eq!(sign(FOX, "k", SignatureAlgorithm::Sha512).unwrap().len(), 128);
    }

    #[test]
    fn test_empty_secret_fails() {
        assert!(matches!(sign(FOX, "", SignatureAlgorithm::Sha384), Err(SignError::EmptySecret)));
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("SHA1".parse::<SignatureAlgorithm>().unwrap(), SignatureAlgorithm::Sha1);
        assert_eq!("sha384".parse::<SignatureAlgorithm>().unwrap(), SignatureAlgorithm::Sha384);
        let err = "md5".parse::<SignatureAlgorithm>().unwrap_err();
        assert!(matches!(err, SignError::UnsupportedAlgorithm(ref a) if a == "md5"));
    }

    #[test]
    fn test_signed_envelope_signs_exact_params() {
        let creds = Credentials::new("my-key", "my-secret");
        let signer = Signer::new(&creds, SignatureAlgorithm::Sha1, Duration::hours(24));
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut params = empty_params();
        let env = signer.envelope(&mut params, true, now).unwrap();

        assert_eq!(env.params, r#"{"auth":{"key":"my-key","expires":"2024/03/02 12:00:00+00:00"},"steps":{}}"#);
        assert_eq!(env.expires_at, Some(Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap()));

        let expected = format!("sha1:{}", sign(&env.params, "my-secret", SignatureAlgorithm::Sha1).unwrap());
        assert_eq!(env.signature.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_unsigned_envelope_has_no_signature_or_expiry() {
        let creds = Credentials::new("my-key", "");
        let signer = Signer::new(&creds, SignatureAlgorithm::default(), Duration::hours(24));
        let mut params = empty_params();
        let env = signer.envelope(&mut params, false, Utc::now()).unwrap();

        assert_eq!(env.params, r#"{"auth":{"key":"my-key"},"steps":{}}"#);
        assert!(env.signature.is_none());
        assert!(env.expires_at.is_none());
    }

    #[test]
    fn test_signed_envelope_with_empty_secret_fails() {
        let creds = Credentials::new("my-key", "");
        let signer = Signer::new(&creds, SignatureAlgorithm::Sha256, Duration::hours(1));
        let err = signer.envelope(&mut empty_params(), true, Utc::now()).unwrap_err();
        assert!(matches!(err, AssemblyError::Signing(SignError::EmptySecret)));
    }
}
