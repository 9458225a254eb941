//! Account, session and single-use token operations
//!
//! `AuthService` covers signup/login/refresh, `FlowManager` the email
//! verification and password reset flows, `SessionIssuer` the token pairs.

mod flows;
mod service;
mod session;

pub use flows::FlowManager;
pub use service::AuthService;
pub use session::{SessionIssuer, TokenPair};
