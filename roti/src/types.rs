//! Common type definitions for the authorization model.
//!
//! - [`Role`]: the closed set of roles a user can hold
//! - [`RoutePermissions`]: the set of roles a route declares as acceptable
//! - [`Principal`]: an authenticated username together with its resolved role

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::Error;

/// Role held by a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    NonAdmin,
    Guest,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::NonAdmin, Role::Guest];
}

/// Roles a route accepts, fixed when the route is declared.
///
/// An empty set and any set containing [`Role::Guest`] both mark the route as public: the access
/// gate admits every request to it without looking at credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePermissions {
    roles: HashSet<Role>,
}

impl RoutePermissions {
    /// A route reachable without credentials.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn is_public(&self) -> bool {
        self.roles.is_empty() || self.roles.contains(&Role::Guest)
    }

    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl FromIterator<Role> for RoutePermissions {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[Role; N]> for RoutePermissions {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

/// The caller of a request admitted through credential verification.
///
/// The access gate stores this in the request extensions. It is absent for requests admitted
/// through dev mode or to public routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}
