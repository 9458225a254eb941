//! Credential store abstraction
//!
//! One capability trait, two backends: Postgres when it answers the startup
//! probe, an in-process seeded map otherwise. Callers go through
//! `StoreHandle` and never branch on which backend is active.

pub mod memory;
pub mod models;
pub mod postgres;

use crate::config::Settings;
use crate::crypto::PasswordHasher;
use crate::error::{AppError, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use models::{Credential, CredentialUpdate, SingleUseToken, TokenPurpose};
pub use postgres::PgStore;

/// Capability set shared by both store variants. Success/error semantics are
/// identical across variants so callers are oblivious to which is active.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    /// Insert a new credential. Fails with `StoreError::Duplicate` when the
    /// email (or a non-null google_id) is already present; no partial record
    /// is created.
    async fn insert_credential(&self, credential: &Credential) -> Result<Uuid, StoreError>;

    /// Apply a partial update; `StoreError::NotFound` when the identity is
    /// absent.
    async fn update_credential(
        &self,
        email: &str,
        update: CredentialUpdate,
    ) -> Result<(), StoreError>;

    async fn insert_single_use(&self, token: &SingleUseToken) -> Result<(), StoreError>;

    /// Drop all single-use records of one purpose for an identity. Reset
    /// reissue uses this so only the most recent token stays redeemable.
    async fn delete_single_use_for(
        &self,
        email: &str,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError>;

    /// Atomically consume a single-use token: locate the unexpired record by
    /// hash and purpose, apply `effect` to its credential, delete the
    /// record. Returns the credential's email. `StoreError::NotFound` when
    /// no live record matches. The record is never deleted without its
    /// effect applied, and never returned twice.
    async fn redeem_single_use(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
        effect: CredentialUpdate,
    ) -> Result<String, StoreError>;

    /// Housekeeping sweep of expired single-use records.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn is_available(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Persistent,
    Ephemeral,
}

/// Process-wide selection of the active backend, decided once by the
/// startup probe and read thereafter.
#[derive(Clone)]
pub struct StoreHandle {
    mode: StoreMode,
    store: Arc<dyn AuthStore>,
}

impl StoreHandle {
    /// Probe the external store with a bounded timeout and pick the backend.
    /// On any probe failure the process still comes up, fully in-memory:
    /// degraded operation is preferred over total failure.
    pub async fn connect(settings: &Settings, hasher: &PasswordHasher) -> Result<Self, AppError> {
        let probe = std::time::Duration::from_secs(settings.database.probe_timeout_secs);

        match tokio::time::timeout(probe, PgStore::connect(&settings.database)).await {
            Ok(Ok(store)) => {
                info!("Connected to Postgres, using persistent credential store");
                Ok(Self {
                    mode: StoreMode::Persistent,
                    store: Arc::new(store),
                })
            }
            Ok(Err(e)) => {
                warn!("Database unreachable ({}), falling back to ephemeral store", e);
                Self::ephemeral(settings, hasher)
            }
            Err(_) => {
                warn!(
                    "Database probe timed out after {}s, falling back to ephemeral store",
                    settings.database.probe_timeout_secs
                );
                Self::ephemeral(settings, hasher)
            }
        }
    }

    /// Build the in-memory backend directly (tests, demo deployments).
    pub fn ephemeral(settings: &Settings, hasher: &PasswordHasher) -> Result<Self, AppError> {
        let store = MemoryStore::seeded(settings, hasher)?;
        Ok(Self {
            mode: StoreMode::Ephemeral,
            store: Arc::new(store),
        })
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn store(&self) -> Arc<dyn AuthStore> {
        Arc::clone(&self.store)
    }
}
