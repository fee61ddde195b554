//! HTTP request handlers for the API endpoints.
//!
//! Handlers do not check permissions themselves: each route is wrapped with
//! [`crate::auth::gate::guarded`] when the router is built, and handlers behind restricted routes
//! can take the authenticated [`crate::types::Principal`] as an extractor.
//!
//! # Handler Modules
//!
//! - [`users`]: Login, logout, role listing and the current principal

pub mod users;
