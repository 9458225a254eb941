use crate::config::Settings;
use crate::crypto::PasswordHasher;
use crate::error::{AppError, StoreError};
use crate::store::models::{Credential, CredentialUpdate, SingleUseToken, TokenPurpose};
use crate::store::AuthStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sample account seeded next to the administrator so the ephemeral mode is
/// usable out of the box.
const SAMPLE_EMAIL: &str = "test@example.com";
const SAMPLE_PASSWORD: &str = "password123";
const SAMPLE_FULL_NAME: &str = "Demo User";

#[derive(Default)]
struct Inner {
    credentials: HashMap<String, Credential>,
    tokens: Vec<SingleUseToken>,
}

/// Ephemeral credential store: an in-process map guarded by one lock, so
/// concurrent signups/redeems cannot race on the same identity key. Contents
/// are lost on restart. Used when the external store is unreachable.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Pre-seed the administrator credential and one sample credential, both
    /// active and verified.
    pub fn seeded(settings: &Settings, hasher: &PasswordHasher) -> Result<Self, AppError> {
        let mut credentials = HashMap::new();

        let mut admin = Credential::new(
            settings.admin.email.clone(),
            settings.admin.full_name.clone(),
            hasher.hash(&settings.admin.password)?,
        );
        admin.is_admin = true;
        admin.is_verified = true;
        credentials.insert(admin.email.clone(), admin);

        let mut sample = Credential::new(
            SAMPLE_EMAIL.to_string(),
            SAMPLE_FULL_NAME.to_string(),
            hasher.hash(SAMPLE_PASSWORD)?,
        );
        sample.is_verified = true;
        credentials.insert(sample.email.clone(), sample);

        Ok(Self {
            inner: RwLock::new(Inner {
                credentials,
                tokens: Vec::new(),
            }),
        })
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.credentials.get(email).cloned())
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.credentials.contains_key(&credential.email) {
            return Err(StoreError::Duplicate);
        }
        if let Some(google_id) = &credential.google_id {
            let taken = inner
                .credentials
                .values()
                .any(|c| c.google_id.as_deref() == Some(google_id));
            if taken {
                return Err(StoreError::Duplicate);
            }
        }

        inner
            .credentials
            .insert(credential.email.clone(), credential.clone());
        Ok(credential.id)
    }

    async fn update_credential(
        &self,
        email: &str,
        update: CredentialUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let credential = inner.credentials.get_mut(email).ok_or(StoreError::NotFound)?;
        update.apply(credential, Utc::now());
        Ok(())
    }

    async fn insert_single_use(&self, token: &SingleUseToken) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.tokens.push(token.clone());
        Ok(())
    }

    async fn delete_single_use_for(
        &self,
        email: &str,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|t| !(t.email == email && t.purpose == purpose));
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn redeem_single_use(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
        effect: CredentialUpdate,
    ) -> Result<String, StoreError> {
        // One write lock covers lookup, effect and deletion, so a token can
        // be validated successfully at most once.
        let mut inner = self.inner.write().await;

        let position = inner.tokens.iter().position(|t| {
            t.token_hash == token_hash && t.purpose == purpose && !t.is_expired(now)
        });
        let Some(position) = position else {
            return Err(StoreError::NotFound);
        };

        let email = inner.tokens[position].email.clone();
        let credential = inner
            .credentials
            .get_mut(&email)
            .ok_or(StoreError::NotFound)?;
        effect.apply(credential, now);

        inner.tokens.remove(position);
        Ok(email)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.tokens.len();
        inner.tokens.retain(|t| !t.is_expired(now));
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential(email: &str) -> Credential {
        Credential::new(email.to_string(), "Test".to_string(), "digest".to_string())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::empty();
        store.insert_credential(&credential("a@x.com")).await.unwrap();

        let found = store.find_credential("a@x.com").await.unwrap();
        assert_eq!(found.unwrap().email, "a@x.com");
        assert!(store.find_credential("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryStore::empty();
        store.insert_credential(&credential("a@x.com")).await.unwrap();

        let err = store
            .insert_credential(&credential("a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn test_duplicate_google_id_rejected() {
        let store = MemoryStore::empty();
        let mut first = credential("a@x.com");
        first.google_id = Some("g-123".to_string());
        store.insert_credential(&first).await.unwrap();

        let mut second = credential("b@x.com");
        second.google_id = Some("g-123".to_string());
        let err = store.insert_credential(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn test_update_missing_credential() {
        let store = MemoryStore::empty();
        let err = store
            .update_credential("nosuch@x.com", CredentialUpdate::mark_verified())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_redeem_is_single_use() {
        let store = MemoryStore::empty();
        store.insert_credential(&credential("a@x.com")).await.unwrap();
        let token = SingleUseToken::new(
            "a@x.com".to_string(),
            "hash-1".to_string(),
            TokenPurpose::Verification,
            Duration::hours(24),
        );
        store.insert_single_use(&token).await.unwrap();

        let email = store
            .redeem_single_use(
                "hash-1",
                TokenPurpose::Verification,
                Utc::now(),
                CredentialUpdate::mark_verified(),
            )
            .await
            .unwrap();
        assert_eq!(email, "a@x.com");
        assert!(store
            .find_credential("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .is_verified);

        // Second redemption of the same hash must miss.
        let err = store
            .redeem_single_use(
                "hash-1",
                TokenPurpose::Verification,
                Utc::now(),
                CredentialUpdate::mark_verified(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_redeem_checks_purpose_and_expiry() {
        let store = MemoryStore::empty();
        store.insert_credential(&credential("a@x.com")).await.unwrap();
        let token = SingleUseToken::new(
            "a@x.com".to_string(),
            "hash-1".to_string(),
            TokenPurpose::Reset,
            Duration::hours(1),
        );
        store.insert_single_use(&token).await.unwrap();

        // Wrong purpose
        let err = store
            .redeem_single_use(
                "hash-1",
                TokenPurpose::Verification,
                Utc::now(),
                CredentialUpdate::mark_verified(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        // Past expiry
        let err = store
            .redeem_single_use(
                "hash-1",
                TokenPurpose::Reset,
                Utc::now() + Duration::hours(2),
                CredentialUpdate::new_password("new".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_single_use_for_purpose() {
        let store = MemoryStore::empty();
        for hash in ["h1", "h2"] {
            store
                .insert_single_use(&SingleUseToken::new(
                    "a@x.com".to_string(),
                    hash.to_string(),
                    TokenPurpose::Reset,
                    Duration::hours(1),
                ))
                .await
                .unwrap();
        }
        store
            .insert_single_use(&SingleUseToken::new(
                "a@x.com".to_string(),
                "h3".to_string(),
                TokenPurpose::Verification,
                Duration::hours(24),
            ))
            .await
            .unwrap();

        let removed = store
            .delete_single_use_for("a@x.com", TokenPurpose::Reset)
            .await
            .unwrap();
        assert_eq!(removed, 2);

        // Verification record untouched
        store.insert_credential(&credential("a@x.com")).await.unwrap();
        assert!(store
            .redeem_single_use(
                "h3",
                TokenPurpose::Verification,
                Utc::now(),
                CredentialUpdate::mark_verified(),
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::empty();
        store
            .insert_single_use(&SingleUseToken::new(
                "a@x.com".to_string(),
                "h1".to_string(),
                TokenPurpose::Reset,
                Duration::hours(1),
            ))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 0);
        assert_eq!(
            store
                .purge_expired(Utc::now() + Duration::hours(2))
                .await
                .unwrap(),
            1
        );
    }
}
