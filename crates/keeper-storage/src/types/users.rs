//! User types.

use chrono::{DateTime, Utc};

use super::UserId;

/// User record
#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
