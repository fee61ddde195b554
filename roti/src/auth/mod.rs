//! Authentication and authorization.
//!
//! Every request carries (or fails to carry) a pair of credentials: a signed session token and a
//! username. They arrive either as two cookies or as a single `Authorization: Bearer
//! <token>:<username>` header. Routes declare which roles may reach them; the access gate checks
//! the token and looks the username's role up on each request.
//!
//! # Request Flow
//!
//! ```text
//! request ──► session renewal (router-wide) ──► access gate (per route) ──► handler
//!                    ▲                                    │
//!                    └──── maybe Set-Cookie ◄── response ◄┘
//! ```
//!
//! # Modules
//!
//! - [`token`]: Issuing and verifying session tokens
//! - [`credentials`]: Extracting the (token, username) pair from a request
//! - [`roles`]: Resolving a username's current role
//! - [`gate`]: The per-route access decision and its middleware
//! - [`cookies`]: Reading, setting and clearing the session cookies
//! - [`renewal`]: Refreshing tokens that are about to expire
//! - [`password`]: Password hashing and verification using Argon2
//!
//! # Usage in Handlers
//!
//! Handlers behind a restricted route can take the authenticated caller as an extractor:
//!
//! ```ignore
//! use roti::types::Principal;
//!
//! async fn whoami(principal: Principal) -> String {
//!     format!("Hello, {}!", principal.username)
//! }
//! ```

pub mod cookies;
pub mod credentials;
pub mod gate;
pub mod password;
pub mod renewal;
pub mod roles;
pub mod token;
