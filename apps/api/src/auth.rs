//! Caller identity as resolved by the upstream auth layer.
//!
//! Sign-in and session handling happen in front of this service. The proxy
//! forwards the caller's role and, for non-admins, the project ids they may
//! access. Both headers are trusted as-is.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::activity::enrichment::PermissionContext;
use crate::errors::AppError;

pub const ROLE_HEADER: &str = "x-hub-role";
pub const PROJECTS_HEADER: &str = "x-hub-project-ids";
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone)]
pub struct Caller(pub PermissionContext);

impl Caller {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.0.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        if role.eq_ignore_ascii_case(ADMIN_ROLE) {
            return Ok(Caller(PermissionContext::admin()));
        }

        let raw_ids = match parts.headers.get(PROJECTS_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| AppError::Validation(format!("{PROJECTS_HEADER} is not valid text")))?,
            None => "",
        };
        Ok(Caller(PermissionContext::scoped(parse_project_ids(raw_ids)?)))
    }
}

fn parse_project_ids(raw: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| AppError::Validation(format!("Invalid project id '{s}' in {PROJECTS_HEADER}")))
        })
        .collect()
}
