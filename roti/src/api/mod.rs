//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `GET /healthz`: liveness, public
//! - `POST /api/users/register`: create an account awaiting approval, public
//! - `POST /api/users/login`: exchange a username and password for session cookies, public
//! - `POST /api/users/logout`: clear the session cookies, any signed-in user
//! - `GET /api/users/roles`: the closed set of roles, admins only
//! - `PUT /api/users/{username}/approval`: approve or revoke an account, admins only
//! - `GET /api/users/me`: the authenticated caller, any signed-in user

pub mod handlers;
pub mod models;
