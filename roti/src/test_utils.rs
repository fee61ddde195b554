//! Test utilities shared by unit and integration tests.

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::TimeDelta;
use std::sync::Arc;

use crate::{
    AppState,
    auth::{
        password::{Argon2Params, hash_string_with_params},
        token::TokenService,
    },
    config::Config,
    db::{
        errors::{DbError, Result},
        users::{InMemoryUsers, LoginRecord, NewUser, UserDirectory},
    },
    types::Role,
};

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        secret_key: Some(TEST_SECRET.to_string()),
        ..Default::default()
    }
}

/// Token service matching [`create_test_config`].
pub fn test_token_service() -> TokenService {
    TokenService::new(TEST_SECRET, TimeDelta::days(7))
}

pub fn create_test_state(config: Config, users: InMemoryUsers) -> AppState {
    let tokens = TokenService::from_config(&config).expect("test config has a secret");
    AppState::builder()
        .config(config)
        .tokens(Arc::new(tokens))
        .users(Arc::new(users) as Arc<dyn UserDirectory>)
        .build()
}

pub fn create_test_server(state: AppState) -> TestServer {
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Directory holding an approved admin `root` and an approved non-admin `alice`, without passwords.
pub fn create_test_users() -> InMemoryUsers {
    let users = InMemoryUsers::new();
    users.insert("root", Role::Admin, None);
    users.insert("alice", Role::NonAdmin, None);
    users
}

/// Argon2 hash with minimal cost, so tests stay fast.
pub fn hash_for_tests(password: &str) -> String {
    let params = Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    hash_string_with_params(password, Some(params)).expect("Failed to hash test password")
}

/// `Cookie` header value carrying both session cookies with their default names.
pub fn session_cookie(token: &str, username: &str) -> String {
    format!("USER_TOKEN={token}; USER_NAME={}", urlencoding::encode(username))
}

/// `Authorization` header value in the bearer pair form.
pub fn bearer_pair(token: &str, username: &str) -> String {
    format!("Bearer {token}:{username}")
}

/// Directory that is always unreachable.
pub struct FailingUsers;

#[async_trait]
impl UserDirectory for FailingUsers {
    async fn find_role(&self, _username: &str) -> Result<Option<Role>> {
        Err(DbError::Unavailable("connection refused".to_string()))
    }

    async fn find_login(&self, _username: &str) -> Result<Option<LoginRecord>> {
        Err(DbError::Unavailable("connection refused".to_string()))
    }

    async fn create_user(&self, _user: &NewUser) -> Result<()> {
        Err(DbError::Unavailable("connection refused".to_string()))
    }

    async fn set_approved(&self, _username: &str, _approved: bool) -> Result<()> {
        Err(DbError::Unavailable("connection refused".to_string()))
    }
}
