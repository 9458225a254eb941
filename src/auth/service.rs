use crate::auth::session::{SessionIssuer, TokenPair};
use crate::config::Settings;
use crate::crypto::{PasswordHasher, TokenCodec, TokenKind};
use crate::error::{AppError, AuthError};
use crate::store::{AuthStore, Credential};
use std::sync::Arc;
use tracing::{info, warn};

/// Account and session operations. Transport-agnostic: callers hand in
/// plaintext identity/secret/token values and get structured results back.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    hasher: PasswordHasher,
    codec: TokenCodec,
    sessions: SessionIssuer,
    admin_email: String,
    require_email_verification: bool,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        hasher: PasswordHasher,
        codec: TokenCodec,
        sessions: SessionIssuer,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
            sessions,
            admin_email: settings.admin.email.clone(),
            require_email_verification: settings.auth.require_email_verification,
        }
    }

    /// Register a new account. The configured admin email signs up with
    /// elevated privileges; everyone else starts as a regular account.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Credential, AppError> {
        let mut credential = Credential::new(
            email.to_string(),
            full_name.to_string(),
            self.hasher.hash(password)?,
        );
        credential.is_admin = email == self.admin_email;
        // Explicit configuration decides whether signups need email
        // verification; the active store backend never does.
        credential.is_verified = !self.require_email_verification;

        self.store
            .insert_credential(&credential)
            .await
            .map_err(AppError::from_store)?;

        info!("Account created for {}", credential.email);
        Ok(credential)
    }

    /// Authenticate and issue a session pair. Unknown identity and wrong
    /// password produce the identical error so callers cannot probe which
    /// addresses have accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let credential = self
            .store
            .find_credential(email)
            .await
            .map_err(AppError::from_store)?;

        let Some(credential) = credential else {
            warn!("Login failed for {}", email);
            return Err(AuthError::InvalidCredential.into());
        };

        if !self.hasher.verify(password, &credential.password_hash) {
            warn!("Login failed for {}", email);
            return Err(AuthError::InvalidCredential.into());
        }

        if !credential.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        // Admins skip the verification requirement
        if self.require_email_verification && !credential.is_admin && !credential.is_verified {
            return Err(AuthError::UnverifiedAccount.into());
        }

        info!("Login successful for {}", credential.email);
        self.sessions.issue_pair(&credential.email)
    }

    /// Exchange a refresh token for a new session pair. The credential is
    /// re-checked so a deactivated account cannot keep rotating sessions.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.codec.decode_expecting(refresh_token, TokenKind::Refresh)?;

        let credential = self
            .store
            .find_credential(&claims.sub)
            .await
            .map_err(AppError::from_store)?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !credential.is_active {
            return Err(AuthError::InactiveAccount.into());
        }

        self.sessions.issue_pair(&credential.email)
    }

    /// Resolve an access token to its credential (transport `/me` support).
    pub async fn identity_from_token(&self, access_token: &str) -> Result<Credential, AppError> {
        let claims = self.codec.decode_expecting(access_token, TokenKind::Access)?;

        self.store
            .find_credential(&claims.sub)
            .await
            .map_err(AppError::from_store)?
            .ok_or_else(|| AuthError::InvalidOrExpiredToken.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialUpdate, MemoryStore};

    fn service(require_verification: bool) -> AuthService {
        let mut settings = Settings::new_for_test().unwrap();
        settings.auth.require_email_verification = require_verification;

        let hasher = PasswordHasher::new(
            settings.auth.password_pepper.clone(),
            settings.auth.bcrypt_cost,
        );
        let codec = TokenCodec::new(&settings.auth.jwt_secret);
        let sessions = SessionIssuer::new(codec.clone(), &settings.auth);
        AuthService::new(
            Arc::new(MemoryStore::empty()),
            hasher,
            codec,
            sessions,
            &settings,
        )
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let service = service(false);
        service.signup("a@x.com", "pw1", "A").await.unwrap();

        let pair = service.login("a@x.com", "pw1").await.unwrap();
        let me = service.identity_from_token(&pair.access_token).await.unwrap();
        assert_eq!(me.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_duplicate_signup() {
        let service = service(false);
        service.signup("a@x.com", "pw1", "A").await.unwrap();

        let err = service.signup("a@x.com", "pw2", "A2").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::AuthError(AuthError::DuplicateIdentity)
        ));
    }

    #[tokio::test]
    async fn test_login_errors_are_uniform() {
        let service = service(false);
        service.signup("a@x.com", "pw1", "A").await.unwrap();

        let wrong_password = service.login("a@x.com", "wrong").await.unwrap_err();
        let no_such_user = service.login("nosuch@x.com", "pw1").await.unwrap_err();

        let render = |e: AppError| match e {
            AppError::AuthError(inner) => (std::mem::discriminant(&inner), inner.to_string()),
            other => panic!("unexpected error: {}", other),
        };
        assert_eq!(render(wrong_password), render(no_such_user));
    }

    #[tokio::test]
    async fn test_unverified_account_cannot_login() {
        let service = service(true);
        service.signup("a@x.com", "pw1", "A").await.unwrap();

        let err = service.login("a@x.com", "pw1").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::AuthError(AuthError::UnverifiedAccount)
        ));
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login_or_refresh() {
        let service = service(false);
        service.signup("a@x.com", "pw1", "A").await.unwrap();
        let pair = service.login("a@x.com", "pw1").await.unwrap();

        let deactivate = CredentialUpdate {
            is_active: Some(false),
            ..CredentialUpdate::default()
        };
        service
            .store
            .update_credential("a@x.com", deactivate)
            .await
            .unwrap();

        let err = service.login("a@x.com", "pw1").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InactiveAccount)));

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InactiveAccount)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let service = service(false);
        service.signup("a@x.com", "pw1", "A").await.unwrap();
        let pair = service.login("a@x.com", "pw1").await.unwrap();

        let err = service.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::AuthError(AuthError::InvalidOrExpiredToken)
        ));

        assert!(service.refresh(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_signup_gets_elevated_flag() {
        let service = service(true);
        let admin = service
            .signup("StructMind@ai.com", "pw", "Admin")
            .await
            .unwrap();
        assert!(admin.is_admin);

        // Admins skip the verification requirement
        assert!(service.login("StructMind@ai.com", "pw").await.is_ok());
    }
}
