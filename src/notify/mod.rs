//! Notifier capability
//!
//! The mail transport lives outside this crate; flows only need a way to
//! hand the plaintext opaque value to the account holder. Delivery failure
//! is reported as `false` and must never abort the issuing flow.

use crate::store::TokenPurpose;
use async_trait::async_trait;
use tracing::info;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a verification/reset message carrying the opaque token.
    /// Returns whether delivery succeeded.
    async fn send(&self, email: &str, purpose: TokenPurpose, token: &str) -> bool;
}

/// Stand-in transport that only logs. Useful for demo deployments and
/// tests; never logs the token itself.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &str, purpose: TokenPurpose, _token: &str) -> bool {
        info!("Would send {} message to {}", purpose, email);
        true
    }
}
