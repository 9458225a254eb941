//! Cryptographic primitives for the auth subsystem
//!
//! Password hashing (peppered bcrypt) and token handling (signed
//! session tokens, opaque single-use tokens).

mod password;
mod token;

pub use password::PasswordHasher;
pub use token::{Claims, TokenCodec, TokenKind};
