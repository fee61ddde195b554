//! Database layer for user accounts.
//!
//! The gateway needs a few facts about a user: the role it currently holds, its stored password
//! hash and whether an admin has approved it. All are read and written through the
//! [`users::UserDirectory`] trait so that the access gate can run against PostgreSQL in production
//! and an in-memory map in tests and local development.
//!
//! # Modules
//!
//! - [`users`]: The directory trait and its implementations
//! - [`errors`]: Database-specific error types

pub mod errors;
pub mod users;
