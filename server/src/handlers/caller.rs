//! Caller identity forwarded by the authenticating gateway.
//!
//! The gateway sets `x-user-id` (UUID), `x-user-roles` (comma separated),
//! and optionally `x-user-email` / `x-user-name`. A request without
//! `x-user-id` is anonymous.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::models::{Caller, Identity, Role};
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| AppError::AuthError(format!("Header '{}' is not valid text", name))),
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, AppError> {
    let Some(raw_id) = header(headers, USER_ID_HEADER)? else {
        return Ok(Caller::Anonymous);
    };

    let subject_id = Uuid::parse_str(raw_id)
        .map_err(|_| AppError::AuthError("Malformed user id".to_string()))?;

    let roles = header(headers, USER_ROLES_HEADER)?
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(|role| role.parse::<Role>().map_err(AppError::AuthError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Caller::User(Identity {
        subject_id,
        roles,
        display_name: header(headers, USER_NAME_HEADER)?.map(str::to_string),
        email: header(headers, USER_EMAIL_HEADER)?.map(str::to_string),
    }))
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}
