use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::store::models::{Credential, CredentialUpdate, SingleUseToken, TokenPurpose};
use crate::store::AuthStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;

const CREDENTIAL_COLUMNS: &str =
    "id, email, full_name, password_hash, is_active, is_verified, is_admin, \
     created_at, updated_at, google_id";

/// Persistent credential store backed by Postgres. Per-record atomicity
/// comes from single-statement operations plus a transaction around token
/// redemption; the unique indexes on email and google_id enforce identity
/// uniqueness at the store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and ping. Pool acquisition is timeout-bounded so a slow
    /// database cannot stall callers indefinitely.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.probe_timeout_secs))
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))
    }

    // SET clause for a partial update; updated_at is always written.
    fn update_builder(
        email: String,
        update: CredentialUpdate,
        now: DateTime<Utc>,
    ) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("UPDATE credentials SET updated_at = ");
        qb.push_bind(now);
        if let Some(full_name) = update.full_name {
            qb.push(", full_name = ");
            qb.push_bind(full_name);
        }
        if let Some(password_hash) = update.password_hash {
            qb.push(", password_hash = ");
            qb.push_bind(password_hash);
        }
        if let Some(is_active) = update.is_active {
            qb.push(", is_active = ");
            qb.push_bind(is_active);
        }
        if let Some(is_verified) = update.is_verified {
            qb.push(", is_verified = ");
            qb.push_bind(is_verified);
        }
        if let Some(is_admin) = update.is_admin {
            qb.push(", is_admin = ");
            qb.push_bind(is_admin);
        }
        if let Some(google_id) = update.google_id {
            qb.push(", google_id = ");
            qb.push_bind(google_id);
        }
        qb.push(" WHERE email = ");
        qb.push_bind(email);
        qb
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<Uuid, StoreError> {
        // Unique-index violations on email/google_id surface as Duplicate
        // via the sqlx error mapping.
        sqlx::query(
            "INSERT INTO credentials \
             (id, email, full_name, password_hash, is_active, is_verified, is_admin, \
              created_at, updated_at, google_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(credential.id)
        .bind(&credential.email)
        .bind(&credential.full_name)
        .bind(&credential.password_hash)
        .bind(credential.is_active)
        .bind(credential.is_verified)
        .bind(credential.is_admin)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .bind(&credential.google_id)
        .execute(&self.pool)
        .await?;

        Ok(credential.id)
    }

    async fn update_credential(
        &self,
        email: &str,
        update: CredentialUpdate,
    ) -> Result<(), StoreError> {
        let mut qb = Self::update_builder(email.to_string(), update, Utc::now());
        let result = qb.build().execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_single_use(&self, token: &SingleUseToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO single_use_tokens \
             (id, email, token_hash, purpose, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token.id)
        .bind(&token.email)
        .bind(&token.token_hash)
        .bind(token.purpose.as_str())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_single_use_for(
        &self,
        email: &str,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM single_use_tokens WHERE email = $1 AND purpose = $2")
                .bind(email)
                .bind(purpose.as_str())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn redeem_single_use(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
        effect: CredentialUpdate,
    ) -> Result<String, StoreError> {
        // The row lock pins the record for the whole redeem, so it is
        // consumed at most once and never deleted without its effect.
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, SingleUseToken>(
            "SELECT id, email, token_hash, purpose, expires_at, created_at \
             FROM single_use_tokens \
             WHERE token_hash = $1 AND purpose = $2 AND expires_at > $3 \
             FOR UPDATE",
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        };

        let mut qb = Self::update_builder(record.email.clone(), effect, now);
        let updated = qb.build().execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM single_use_tokens WHERE id = $1")
            .bind(record.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record.email)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM single_use_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn is_available(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
