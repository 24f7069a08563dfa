use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("multipart error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dotenv error: {0}")]
    DotEnv(#[from] dotenv::Error),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Multipart(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) | Error::Token(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) | Error::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            // the caller gets a generic body, the detail stays in the log
            log::error!("request failed: {}", self);
            return HttpResponse::build(status).json(json!({ "message": "internal server error" }));
        }
        HttpResponse::build(status).json(json!({ "message": self.to_string() }))
    }
}
