use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Caller-visible failure kinds. The transport layer owns the mapping to
/// status codes; nothing here knows about HTTP.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateIdentity,

    /// Deliberately covers both unknown identity and wrong password so
    /// responses cannot be used to enumerate accounts.
    #[error("Incorrect email or password")]
    InvalidCredential,

    #[error("Account is deactivated")]
    InactiveAccount,

    #[error("Please verify your email before logging in")]
    UnverifiedAccount,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,

    #[error("Store unavailable")]
    Unavailable,
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Uniqueness violations surface as Duplicate so callers never see the
// underlying store's native error.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Duplicate
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::ConnectionError(err.to_string())
            }
            _ => StoreError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StoreError(err.into())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl AppError {
    /// Lift a store failure into the caller-facing taxonomy. Uniqueness
    /// collisions become `DuplicateIdentity`; everything else stays a
    /// store error.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AppError::AuthError(AuthError::DuplicateIdentity),
            other => AppError::StoreError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_conversion() {
        let store_err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(store_err, StoreError::NotFound));

        let app_err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(app_err, AppError::StoreError(StoreError::NotFound)));
    }

    #[test]
    fn test_duplicate_translation() {
        let app_err = AppError::from_store(StoreError::Duplicate);
        assert!(matches!(
            app_err,
            AppError::AuthError(AuthError::DuplicateIdentity)
        ));

        let app_err = AppError::from_store(StoreError::NotFound);
        assert!(matches!(app_err, AppError::StoreError(StoreError::NotFound)));
    }

    #[test]
    fn test_uniform_credential_error_message() {
        // Unknown identity and wrong password must render identically.
        assert_eq!(
            AuthError::InvalidCredential.to_string(),
            "Incorrect email or password"
        );
    }

    #[test]
    fn test_error_display() {
        let err = AppError::AuthError(AuthError::InvalidOrExpiredToken);
        assert_eq!(
            err.to_string(),
            "Authentication error: Invalid or expired token"
        );

        let err = AppError::StoreError(StoreError::NotFound);
        assert_eq!(err.to_string(), "Store error: Record not found");
    }
}
