use crate::config::AuthConfig;
use crate::crypto::{TokenCodec, TokenKind};
use crate::error::AppError;
use chrono::Duration;
use serde::Serialize;

/// Access + refresh pair handed to a freshly authenticated caller.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Composes the token codec into session pairs: a short-lived access token
/// and a long-lived refresh token, both bound to the same subject. No
/// storage side effects.
#[derive(Clone)]
pub struct SessionIssuer {
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(codec: TokenCodec, config: &AuthConfig) -> Self {
        Self {
            codec,
            access_ttl: Duration::minutes(config.access_token_expiry_minutes),
            refresh_ttl: Duration::days(config.refresh_token_expiry_days),
        }
    }

    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.codec.issue(subject, self.access_ttl, TokenKind::Access)?,
            refresh_token: self
                .codec
                .issue(subject, self.refresh_ttl, TokenKind::Refresh)?,
            token_type: "bearer".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn issuer() -> (SessionIssuer, TokenCodec) {
        let settings = Settings::new_for_test().unwrap();
        let codec = TokenCodec::new(&settings.auth.jwt_secret);
        (SessionIssuer::new(codec.clone(), &settings.auth), codec)
    }

    #[test]
    fn test_pair_carries_subject_and_kinds() {
        let (issuer, codec) = issuer();
        let pair = issuer.issue_pair("a@x.com").unwrap();

        let access = codec.decode_expecting(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(access.sub, "a@x.com");

        let refresh = codec
            .decode_expecting(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(refresh.sub, "a@x.com");

        assert_eq!(pair.token_type, "bearer");
    }

    #[test]
    fn test_refresh_outlives_access() {
        let (issuer, codec) = issuer();
        let pair = issuer.issue_pair("a@x.com").unwrap();

        let access = codec.decode(&pair.access_token).unwrap();
        let refresh = codec.decode(&pair.refresh_token).unwrap();
        assert!(refresh.exp > access.exp);
    }
}
