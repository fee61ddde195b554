//! User directory: where usernames are mapped to roles, password hashes and approval state.

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    db::errors::{DbError, Result},
    types::Role,
};

/// What login needs to know about an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRecord {
    pub password_hash: Option<String>,
    /// Accounts start unapproved and cannot log in until an admin approves them
    pub approved: bool,
}

/// A self-registered account. It starts unapproved.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Access to user accounts.
///
/// Lookups are made fresh on every call; implementations must not cache roles, so a role change
/// takes effect on the very next request.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Current role of the user, or `None` if no such user exists.
    async fn find_role(&self, username: &str) -> Result<Option<Role>>;

    /// Password hash and approval state, or `None` if no such user exists.
    async fn find_login(&self, username: &str) -> Result<Option<LoginRecord>>;

    /// Store a new, unapproved account.
    ///
    /// Fails with [`DbError::UniqueViolation`] when the username or the email is already taken.
    async fn create_user(&self, user: &NewUser) -> Result<()>;

    /// Grant or revoke the right to log in. Fails with [`DbError::NotFound`] for unknown users.
    async fn set_approved(&self, username: &str, approved: bool) -> Result<()>;
}

/// Directory backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUsers {
    db: PgPool,
}

impl PgUsers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUsers {
    #[instrument(skip(self), err)]
    async fn find_role(&self, username: &str) -> Result<Option<Role>> {
        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(role)
    }

    #[instrument(skip(self), err)]
    async fn find_login(&self, username: &str) -> Result<Option<LoginRecord>> {
        let row = sqlx::query_as::<_, (Option<String>, bool)>("SELECT password_hash, approved FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|(password_hash, approved)| LoginRecord { password_hash, approved }))
    }

    #[instrument(skip_all, fields(username = %user.username), err)]
    async fn create_user(&self, user: &NewUser) -> Result<()> {
        sqlx::query("INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4)")
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn set_approved(&self, username: &str, approved: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET approved = $2 WHERE username = $1")
            .bind(username)
            .bind(approved)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}

/// Insert the admin user, or promote it back to an approved admin and refresh its password if it
/// exists.
///
/// An existing password is kept when `password_hash` is `None`.
#[instrument(skip_all, fields(username = %username), err)]
pub async fn upsert_admin_user(username: &str, password_hash: Option<&str>, db: &PgPool) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (username, password_hash, role, approved) VALUES ($1, $2, $3, TRUE)
         ON CONFLICT (username) DO UPDATE
         SET role = EXCLUDED.role, approved = TRUE,
             password_hash = COALESCE(EXCLUDED.password_hash, users.password_hash)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(Role::Admin)
    .execute(db)
    .await?;

    Ok(())
}

#[derive(Debug, Clone)]
struct StoredUser {
    role: Role,
    email: Option<String>,
    password_hash: Option<String>,
    approved: bool,
}

fn unique_violation(constraint: &str, message: String) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some("users".to_string()),
        message,
    }
}

/// Directory kept in process memory.
///
/// Used when no database is configured and by the test suite. Clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUsers {
    users: Arc<DashMap<String, StoredUser>>,
    // email -> username
    emails: Arc<DashMap<String, String>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an approved user without an email, replacing any existing one with the same name.
    pub fn insert(&self, username: impl Into<String>, role: Role, password_hash: Option<String>) {
        let user = StoredUser {
            role,
            email: None,
            password_hash,
            approved: true,
        };
        if let Some(previous) = self.users.insert(username.into(), user) {
            self.release_email(previous.email);
        }
    }

    /// Change an existing user's role. Returns whether the user existed.
    pub fn set_role(&self, username: &str, role: Role) -> bool {
        match self.users.get_mut(username) {
            Some(mut user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, username: &str) -> bool {
        match self.users.remove(username) {
            Some((_, user)) => {
                self.release_email(user.email);
                true
            }
            None => false,
        }
    }

    fn release_email(&self, email: Option<String>) {
        if let Some(email) = email {
            self.emails.remove(&email);
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUsers {
    async fn find_role(&self, username: &str) -> Result<Option<Role>> {
        Ok(self.users.get(username).map(|user| user.role))
    }

    async fn find_login(&self, username: &str) -> Result<Option<LoginRecord>> {
        Ok(self.users.get(username).map(|user| LoginRecord {
            password_hash: user.password_hash.clone(),
            approved: user.approved,
        }))
    }

    async fn create_user(&self, user: &NewUser) -> Result<()> {
        // Reserve the email first so two registrations cannot both claim it
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(unique_violation("users_email_unique", format!("email {} is already registered", user.email)));
            }
            Entry::Vacant(entry) => {
                entry.insert(user.username.clone());
            }
        }

        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => {
                self.emails.remove(&user.email);
                Err(unique_violation("users_pkey", format!("username {} is already taken", user.username)))
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredUser {
                    role: user.role,
                    email: Some(user.email.clone()),
                    password_hash: Some(user.password_hash.clone()),
                    approved: false,
                });
                Ok(())
            }
        }
    }

    async fn set_approved(&self, username: &str, approved: bool) -> Result<()> {
        let mut user = self.users.get_mut(username).ok_or(DbError::NotFound)?;
        user.approved = approved;
        Ok(())
    }
}
