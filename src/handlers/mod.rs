pub mod poll;
pub mod upload;

use actix_web::http::StatusCode;
use actix_web::web::{Data, Json};
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, query_scalar, PgConnection, PgPool};

use crate::context::UserInfo;
use crate::core::tokener::{Claim, Tokener};
use crate::error::Error;
use crate::impls::tokener::jwt::JWT;
use crate::middlewares::jwt::JWT_SECRET;
use crate::models::user::{PublicUser, User};
use crate::response::Message;

const MIN_PASSWORD_LEN: usize = 6;

fn validate_password(password: &str) -> Result<(), Error> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(Error::Validation("password must contain a lowercase letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(Error::Validation("password must contain an uppercase letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::Validation("password must contain a digit".into()));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, Error> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    Ok(bcrypt::verify(password, hash)?)
}

fn gen_token(user_id: i64) -> Result<String, Error> {
    let secret = dotenv::var(JWT_SECRET)?;
    let tokener = JWT::new(secret.into_bytes());
    tokener.gen_token(&Claim::for_user(user_id))
}

async fn load_public_user(conn: &mut PgConnection, user: User) -> Result<PublicUser, Error> {
    let voted: Vec<i64> = query_scalar("SELECT poll_id FROM votes WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user.id)
        .fetch_all(&mut *conn)
        .await?;
    let bookmarked: Vec<i64> = query_scalar("SELECT poll_id FROM bookmarks WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user.id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(PublicUser::from_user(user, voted, bookmarked))
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

pub async fn register(Json(body): Json<Register>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    if body.username.trim().is_empty()
        || body.fullname.trim().is_empty()
        || body.email.trim().is_empty()
        || body.password.is_empty()
    {
        return Err(Error::Validation("please fill in all fields".into()));
    }
    validate_password(&body.password)?;
    let mut tx = db.begin().await?;
    let taken: bool = query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)")
        .bind(&body.username)
        .bind(&body.email)
        .fetch_one(&mut tx)
        .await?;
    if taken {
        return Err(Error::Conflict("username or email already in use".into()));
    }
    let hash = hash_password(&body.password)?;
    let user: User = query_as(
        "INSERT INTO users (username, fullname, email, password, profile_image_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *",
    )
    .bind(&body.username)
    .bind(&body.fullname)
    .bind(&body.email)
    .bind(&hash)
    .bind(body.profile_image_url.as_deref().unwrap_or_default())
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    let token = gen_token(user.id)?;
    let user = PublicUser::from_user(user, Vec::new(), Vec::new());
    Ok(HttpResponse::build(StatusCode::CREATED).json(TokenResponse { token, user }))
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

pub async fn login(Json(Login { email, password }): Json<Login>, db: Data<PgPool>) -> Result<Json<TokenResponse>, Error> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(Error::Validation("please fill in all fields".into()));
    }
    let mut conn = db.acquire().await?;
    let user: Option<User> = query_as("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&mut conn)
        .await?;
    // unknown email and wrong password answer identically
    let user = match user {
        None => return Err(Error::Unauthorized("invalid credentials".into())),
        Some(user) => {
            if !verify_password(&password, &user.password)? {
                return Err(Error::Unauthorized("invalid credentials".into()));
            }
            user
        }
    };
    let token = gen_token(user.id)?;
    let user = load_public_user(&mut conn, user).await?;
    Ok(Json(TokenResponse { token, user }))
}

pub async fn logout(_user_info: UserInfo) -> Json<Message> {
    // tokens are stateless; the client drops its copy
    Json(Message::new("logged out successfully"))
}

pub async fn get_user(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<UserResponse>, Error> {
    let mut conn = db.acquire().await?;
    let user: Option<User> = query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_info.id)
        .fetch_optional(&mut conn)
        .await?;
    let user = user.ok_or_else(|| Error::NotFound("user not found".into()))?;
    let user = load_public_user(&mut conn, user).await?;
    Ok(Json(UserResponse { user }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub fullname: String,
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

pub async fn update_profile(
    user_info: UserInfo,
    Json(body): Json<UpdateProfile>,
    db: Data<PgPool>,
) -> Result<Json<UserResponse>, Error> {
    if body.username.trim().is_empty() || body.fullname.trim().is_empty() {
        return Err(Error::Validation("please fill in all fields".into()));
    }
    let mut tx = db.begin().await?;
    let taken: bool = query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND id <> $2)")
        .bind(&body.username)
        .bind(user_info.id)
        .fetch_one(&mut tx)
        .await?;
    if taken {
        return Err(Error::Conflict("username already in use".into()));
    }
    let user: Option<User> = query_as(
        "UPDATE users
        SET fullname = $1, username = $2, profile_image_url = COALESCE($3, profile_image_url), updated_at = now()
        WHERE id = $4
        RETURNING *",
    )
    .bind(&body.fullname)
    .bind(&body.username)
    .bind(body.profile_image_url.as_deref())
    .bind(user_info.id)
    .fetch_optional(&mut tx)
    .await?;
    let user = user.ok_or_else(|| Error::NotFound("user not found".into()))?;
    let user = load_public_user(&mut tx, user).await?;
    tx.commit().await?;
    Ok(Json(UserResponse { user }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    user_info: UserInfo,
    Json(body): Json<ChangePassword>,
    db: Data<PgPool>,
) -> Result<Json<Message>, Error> {
    let mut conn = db.acquire().await?;
    let stored: Option<String> = query_scalar("SELECT password FROM users WHERE id = $1")
        .bind(user_info.id)
        .fetch_optional(&mut conn)
        .await?;
    let stored = stored.ok_or_else(|| Error::NotFound("user not found".into()))?;
    if !verify_password(&body.current_password, &stored)? {
        return Err(Error::Unauthorized("current password is incorrect".into()));
    }
    if body.new_password == body.current_password {
        return Err(Error::Validation("new password must differ from the current one".into()));
    }
    validate_password(&body.new_password)?;
    let hash = hash_password(&body.new_password)?;
    query("UPDATE users SET password = $1, updated_at = now() WHERE id = $2")
        .bind(&hash)
        .bind(user_info.id)
        .execute(&mut conn)
        .await?;
    Ok(Json(Message::new("password updated")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_policy_rejects_short_passwords() {
        assert!(validate_password("Ab1").is_err());
    }

    #[test]
    fn test_policy_requires_lowercase() {
        assert!(validate_password("PASSW0RD").is_err());
    }

    #[test]
    fn test_policy_requires_uppercase() {
        assert!(validate_password("passw0rd").is_err());
    }

    #[test]
    fn test_policy_requires_digit() {
        assert!(validate_password("Password").is_err());
    }

    #[test]
    fn test_policy_accepts_compliant_password() {
        assert!(validate_password("Passw0rd").is_ok());
    }

    #[test]
    fn test_stored_hash_is_never_the_plaintext() {
        let hash = hash_password("Passw0rd").unwrap();
        assert_ne!(hash, "Passw0rd");
        assert!(verify_password("Passw0rd", &hash).unwrap());
    }

    #[test]
    fn test_wrong_password_fails_verification() {
        let hash = hash_password("Passw0rd").unwrap();
        assert!(!verify_password("Passw0rd!", &hash).unwrap());
    }
}
