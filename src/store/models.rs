use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// A stored account credential. The password is only ever present as its
/// peppered bcrypt digest.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Federated login link (e.g. a Google subject id); unique when present.
    pub google_id: Option<String>,
}

impl Credential {
    pub fn new(email: String, full_name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            full_name,
            password_hash,
            is_active: true,
            is_verified: false,
            is_admin: false,
            created_at: now,
            updated_at: now,
            google_id: None,
        }
    }
}

/// Partial update applied to a credential; `None` fields are left untouched.
/// `updated_at` is always written.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_admin: Option<bool>,
    pub google_id: Option<String>,
}

impl CredentialUpdate {
    pub fn mark_verified() -> Self {
        Self {
            is_verified: Some(true),
            ..Self::default()
        }
    }

    pub fn new_password(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            ..Self::default()
        }
    }

    pub fn apply(&self, credential: &mut Credential, now: DateTime<Utc>) {
        if let Some(full_name) = &self.full_name {
            credential.full_name = full_name.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            credential.password_hash = password_hash.clone();
        }
        if let Some(is_active) = self.is_active {
            credential.is_active = is_active;
        }
        if let Some(is_verified) = self.is_verified {
            credential.is_verified = is_verified;
        }
        if let Some(is_admin) = self.is_admin {
            credential.is_admin = is_admin;
        }
        if let Some(google_id) = &self.google_id {
            credential.google_id = Some(google_id.clone());
        }
        credential.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Verification,
    Reset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Verification => "verification",
            TokenPurpose::Reset => "reset",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "verification" => Some(TokenPurpose::Verification),
            "reset" => Some(TokenPurpose::Reset),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-use token record. Only the sha-256 of the opaque value is
/// stored, so a store compromise does not expose redeemable secrets.
#[derive(Debug, Clone)]
pub struct SingleUseToken {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SingleUseToken {
    pub fn new(email: String, token_hash: String, purpose: TokenPurpose, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            token_hash,
            purpose,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// Manual FromRow: `purpose` is stored as TEXT and decoded through the enum.
impl<'r> FromRow<'r, PgRow> for SingleUseToken {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let purpose: String = row.try_get("purpose")?;
        let purpose = TokenPurpose::from_str(&purpose).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "purpose".into(),
                source: format!("unknown token purpose: {}", purpose).into(),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            token_hash: row.try_get("token_hash")?,
            purpose,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
