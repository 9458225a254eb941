pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod notify;
pub mod store;

use std::sync::Arc;

pub use error::{AppError, AuthError, StoreError};
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, FlowManager, SessionIssuer, TokenPair};
pub use crypto::{PasswordHasher, TokenCodec, TokenKind};
pub use notify::{LogNotifier, Notifier};
pub use store::{AuthStore, Credential, StoreHandle, StoreMode};

/// Wired-up subsystem shared across all transports: configuration, the
/// selected store backend, and the services built on it.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<Settings>,
    pub store: StoreHandle,
    pub auth: Arc<AuthService>,
    pub flows: Arc<FlowManager>,
}

impl AuthState {
    /// Probe the external store and wire everything up. The probe is
    /// timeout-bounded and a failure only degrades to the ephemeral
    /// backend; startup itself cannot hang or fail on a dead database.
    pub async fn new(config: Settings, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let hasher = PasswordHasher::new(
            config.auth.password_pepper.clone(),
            config.auth.bcrypt_cost,
        );
        let store = StoreHandle::connect(&config, &hasher).await?;
        Self::assemble(config, store, hasher, notifier)
    }

    /// Skip the probe and run fully in-memory (demo deployments, tests).
    pub fn ephemeral(config: Settings, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let hasher = PasswordHasher::new(
            config.auth.password_pepper.clone(),
            config.auth.bcrypt_cost,
        );
        let store = StoreHandle::ephemeral(&config, &hasher)?;
        Self::assemble(config, store, hasher, notifier)
    }

    fn assemble(
        config: Settings,
        store: StoreHandle,
        hasher: PasswordHasher,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let codec = TokenCodec::new(&config.auth.jwt_secret);
        let sessions = SessionIssuer::new(codec.clone(), &config.auth);

        let auth = AuthService::new(
            store.store(),
            hasher.clone(),
            codec,
            sessions,
            &config,
        );
        let flows = FlowManager::new(store.store(), hasher, notifier, &config);

        Ok(Self {
            config: Arc::new(config),
            store,
            auth: Arc::new(auth),
            flows: Arc::new(flows),
        })
    }

    pub fn current_mode(&self) -> StoreMode {
        self.store.mode()
    }
}
