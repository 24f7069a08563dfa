use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub trait Payload: Serialize + for<'d> Deserialize<'d> {
    fn user(&self) -> &str;
}

pub trait Tokener<P: Payload> {
    fn gen_token(&self, payload: &P) -> Result<String, Error>;
    fn verify_token(&self, token: &str) -> Result<P, Error>;
}

pub const TOKEN_TTL_DAYS: i64 = 7;

/// Claims carried by an access token. `user` is the subject's user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claim {
    pub user: String,
    pub exp: i64,
}

impl Claim {
    pub fn for_user(id: i64) -> Self {
        Claim {
            user: id.to_string(),
            exp: chrono::Utc::now().add(chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        }
    }
}

impl Payload for Claim {
    fn user(&self) -> &str {
        &self.user
    }
}
