use crate::error::{AppError, AuthError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Discriminator preventing token-type confusion: a refresh token can never
/// pass where an access token is expected, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject identity (email)
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
    pub kind: TokenKind,
}

/// Signs and verifies self-contained session tokens, and produces/hashes
/// opaque single-use tokens. Session tokens carry their own expiry and kind,
/// so no server-side session table exists; revocation is only by secret
/// rotation or expiry.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, subject: &str, ttl: Duration, kind: TokenKind) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            kind,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify signature and expiry, returning the embedded claims. Any
    /// signature mismatch, malformed structure, or past expiry collapses to
    /// `InvalidOrExpiredToken` - never a partial result.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; the default 60s leeway would let expired tokens
        // linger past their embedded instant.
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidOrExpiredToken)
    }

    /// `decode`, additionally rejecting tokens of the wrong kind.
    pub fn decode_expecting(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.decode(token)?;
        if claims.kind != kind {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        Ok(claims)
    }

    /// Cryptographically secure random value for verification/reset tokens:
    /// 32 bytes (256 bits) of OS entropy, URL-safe base64.
    pub fn generate_opaque() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Deterministic one-way hash for single-use token storage. The input is
    /// high-entropy random, so no pepper or slow hash is needed; redemption
    /// is a digest equality check.
    pub fn hash_opaque(value: &str) -> String {
        format!("{:x}", Sha256::digest(value.as_bytes()))
    }
}
