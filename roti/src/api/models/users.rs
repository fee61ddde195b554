use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Request to login
#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Request to register a new account
#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Username (must be unique)
    pub username: String,
    /// Email address (must be unique)
    pub email: String,
    /// Password (will be hashed)
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// An account as shown to its owner or to an admin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub approved: bool,
}

/// Request to approve or revoke an account
#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

/// Approval state after an update
#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub username: String,
    pub approved: bool,
}

/// Response after successful login
#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub username: String,
    pub role: Role,
    /// Session token, for clients that send credentials in the `Authorization` header
    pub token: String,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Structured response for successful registration. No session is started: the account still
/// needs approval.
pub struct RegisterResponse {
    pub user: UserResponse,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.user)).into_response()
    }
}

/// Structured response for successful login
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    /// `Set-Cookie` headers for the session
    pub cookies: HeaderMap,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.cookies, Json(self.auth_response)).into_response()
    }
}

/// Structured response for successful logout
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    /// `Set-Cookie` headers clearing the session
    pub cookies: HeaderMap,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.cookies, Json(self.auth_response)).into_response()
    }
}
