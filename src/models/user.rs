use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub profile_image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire projection of a user: everything except the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub profile_image_url: String,
    pub voted_polls: Vec<i64>,
    pub bookmarked_polls: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublicUser {
    pub fn from_user(user: User, voted_polls: Vec<i64>, bookmarked_polls: Vec<i64>) -> Self {
        PublicUser {
            id: user.id,
            username: user.username,
            fullname: user.fullname,
            email: user.email,
            profile_image_url: user.profile_image_url,
            voted_polls,
            bookmarked_polls,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
