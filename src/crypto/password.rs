use crate::error::AppError;

/// One-way password hashing with a process-wide pepper.
///
/// The pepper is appended to the plaintext before bcrypt runs, so a leaked
/// digest alone is not attackable without the server secret. bcrypt supplies
/// the per-hash salt and a constant-time comparison in `verify`.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: String,
    cost: u32,
}

impl PasswordHasher {
    pub fn new(pepper: String, cost: u32) -> Self {
        Self { pepper, cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let peppered = format!("{}{}", password, self.pepper);
        Ok(bcrypt::hash(peppered, self.cost)?)
    }

    /// Verify a password against a stored digest. A malformed digest yields
    /// `false` rather than an error; callers treat it as a plain mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let peppered = format!("{}{}", password, self.pepper);
        bcrypt::verify(peppered, digest).unwrap_or(false)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the pepper in logs
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
