use crate::config::Settings;
use crate::crypto::{PasswordHasher, TokenCodec};
use crate::error::{AppError, AuthError, StoreError};
use crate::notify::Notifier;
use crate::store::{AuthStore, CredentialUpdate, SingleUseToken, TokenPurpose};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates the email verification and password reset flows: issue an
/// opaque single-use token, hand the plaintext to the notifier, and later
/// redeem it atomically against the store.
pub struct FlowManager {
    store: Arc<dyn AuthStore>,
    hasher: PasswordHasher,
    notifier: Arc<dyn Notifier>,
    verification_ttl: Duration,
    reset_ttl: Duration,
}

impl FlowManager {
    pub fn new(
        store: Arc<dyn AuthStore>,
        hasher: PasswordHasher,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            hasher,
            notifier,
            verification_ttl: Duration::hours(settings.flows.verification_expiry_hours),
            reset_ttl: Duration::hours(settings.flows.reset_expiry_hours),
        }
    }

    /// Issue a verification token for an unverified account. Reports success
    /// whether or not the identity exists so the endpoint cannot be used to
    /// enumerate accounts.
    pub async fn request_verification(&self, email: &str) -> Result<(), AppError> {
        let credential = self
            .store
            .find_credential(email)
            .await
            .map_err(AppError::from_store)?;

        let Some(credential) = credential else {
            return Ok(());
        };
        if credential.is_verified {
            return Ok(());
        }

        self.issue(email, TokenPurpose::Verification, self.verification_ttl)
            .await
    }

    /// Redeem a verification token: marks the credential verified and
    /// consumes the record in one step.
    pub async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        let email = self
            .redeem(token, TokenPurpose::Verification, CredentialUpdate::mark_verified())
            .await?;

        info!("Email verified for {}", email);
        Ok(())
    }

    /// Issue a reset token. Prior unconsumed reset records for the identity
    /// are dropped first, so only the most recent token stays redeemable.
    /// Uniform success response regardless of identity existence.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let credential = self
            .store
            .find_credential(email)
            .await
            .map_err(AppError::from_store)?;

        if credential.is_none() {
            return Ok(());
        }

        self.store
            .delete_single_use_for(email, TokenPurpose::Reset)
            .await
            .map_err(AppError::from_store)?;

        self.issue(email, TokenPurpose::Reset, self.reset_ttl).await
    }

    /// Redeem a reset token: overwrites the stored password hash and
    /// consumes the record in one step. On an invalid or expired token the
    /// credential is untouched.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let password_hash = self.hasher.hash(new_password)?;

        let email = self
            .redeem(
                token,
                TokenPurpose::Reset,
                CredentialUpdate::new_password(password_hash),
            )
            .await?;

        info!("Password reset for {}", email);
        Ok(())
    }

    async fn issue(
        &self,
        email: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let value = TokenCodec::generate_opaque();
        let record = SingleUseToken::new(
            email.to_string(),
            TokenCodec::hash_opaque(&value),
            purpose,
            ttl,
        );

        self.store
            .insert_single_use(&record)
            .await
            .map_err(AppError::from_store)?;

        // Persistence already succeeded; a delivery failure is reported but
        // does not fail the flow.
        if !self.notifier.send(email, purpose, &value).await {
            warn!("Failed to deliver {} message to {}", purpose, email);
        }

        Ok(())
    }

    async fn redeem(
        &self,
        token: &str,
        purpose: TokenPurpose,
        effect: CredentialUpdate,
    ) -> Result<String, AppError> {
        self.store
            .redeem_single_use(&TokenCodec::hash_opaque(token), purpose, Utc::now(), effect)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::InvalidOrExpiredToken.into(),
                other => AppError::from_store(other),
            })
    }
}
