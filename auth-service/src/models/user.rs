use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

/// User row. The primary role is never stored here; it is derived from the
/// active role assignments.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub subscription_type: Option<String>,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Anything other than `active` counts as disabled.
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active.as_str()
    }

    pub fn summary(&self, role: &str) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: role.to_string(),
            status: self.status.clone(),
            email_verified: self.email_verified,
            phone_verified: self.phone_verified,
            subscription_type: self.subscription_type.clone(),
            subscription_expires_at: self.subscription_expires_at,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }
}

/// User record as returned over the API. Carries no credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub subscription_type: Option<String>,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
