use actix_web::{
    error,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use derive_more::{Display, Error};
use log::error;

use crate::db::StoreError;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    #[display(fmt = "student")]
    Student,
    #[display(fmt = "course")]
    Course,
    #[display(fmt = "registration")]
    Registration,
    #[display(fmt = "user")]
    User,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    #[display(fmt = "registration already exists")]
    Duplicate,
    #[display(fmt = "class is full")]
    Full,
    #[display(fmt = "email already exists")]
    EmailExists,
    #[display(fmt = "capacity is below the current number of registrations")]
    CapacityBelowRegistrations,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    #[display(fmt = "invite code is not active")]
    Inactive,
    #[display(fmt = "invite code already used")]
    AlreadyUsed,
    #[display(fmt = "invite code expired")]
    Expired,
    #[display(fmt = "invite code not allowed for this email")]
    EmailMismatch,
    #[display(fmt = "insufficient role permissions")]
    InsufficientRole,
}

/// Why a caller could not be authenticated. Messages are fixed strings so
/// nothing about the token or the account leaks into the response.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[display(fmt = "authorization header is required")]
    MissingHeader,
    #[display(fmt = "malformed token, use 'Bearer <token>' format")]
    MalformedHeader,
    #[display(fmt = "session expired, please log in again")]
    Expired,
    #[display(fmt = "invalid security token, authentication failed")]
    InvalidToken,
    #[display(fmt = "invalid email or password")]
    BadCredentials,
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(#[error(not(source))] String),

    #[display(fmt = "{} not found", _0)]
    NotFound(#[error(not(source))] Missing),

    #[display(fmt = "{}", _0)]
    Conflict(#[error(not(source))] ConflictKind),

    #[display(fmt = "{}", _0)]
    Forbidden(#[error(not(source))] ForbiddenKind),

    #[display(fmt = "{}", _0)]
    Unauthorized(#[error(not(source))] AuthFailure),

    #[display(fmt = "invalid invite code")]
    InvalidInviteCode,

    #[display(fmt = "internal error")]
    InternalError,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        error!("store failure: {}", err);
        AppError::InternalError
    }
}

impl error::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(serde_json::json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidInviteCode => StatusCode::BAD_REQUEST,
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
