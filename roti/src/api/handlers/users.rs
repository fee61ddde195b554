use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, Uri},
};

use crate::{
    AppState,
    api::models::users::{
        ApprovalRequest, ApprovalResponse, AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse,
        RegisterRequest, RegisterResponse, UserResponse,
    },
    auth::{
        cookies::{self, CookieTransport},
        password,
    },
    db::users::NewUser,
    errors::Error,
    types::{Principal, Role},
};

const MAX_USERNAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 100;

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

fn bad_request(message: impl Into<String>) -> Error {
    Error::BadRequest { message: message.into() }
}

fn validate_username(username: &str) -> Result<(), Error> {
    if username.trim().is_empty() {
        return Err(bad_request("Username is required"));
    }
    if username.trim() != username {
        return Err(bad_request("Username cannot start or end with whitespace"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(bad_request(format!("Username must be no more than {MAX_USERNAME_LENGTH} characters")));
    }
    if username.chars().any(char::is_control) {
        return Err(bad_request("Username cannot contain control characters"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), Error> {
    let well_formed = email.chars().count() <= MAX_EMAIL_LENGTH
        && !email.chars().any(|c| c.is_whitespace() || c.is_control())
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
    if !well_formed {
        return Err(bad_request("A valid email address is required"));
    }
    Ok(())
}

/// Register a new account. It cannot log in until an admin approves it.
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    let auth = &state.config.auth;
    if !auth.allow_registration {
        return Err(bad_request("User registration is disabled"));
    }

    validate_username(&request.username)?;
    validate_email(&request.email)?;

    let password_config = &auth.password;
    if request.password.len() < password_config.min_length {
        return Err(bad_request(format!(
            "Password must be at least {} characters",
            password_config.min_length
        )));
    }
    if request.password.len() > password_config.max_length {
        return Err(bad_request(format!(
            "Password must be no more than {} characters",
            password_config.max_length
        )));
    }

    // Hash the password on a blocking thread to avoid blocking async runtime
    let password_hash = password::hash_blocking(request.password).await?;

    let user = NewUser {
        username: request.username,
        email: request.email,
        password_hash,
        role: Role::NonAdmin,
    };
    state.users.create_user(&user).await?;

    tracing::info!(username = %user.username, "User registered, awaiting approval");

    Ok(RegisterResponse {
        user: UserResponse {
            username: user.username,
            email: user.email,
            role: user.role,
            approved: false,
        },
    })
}

/// Approve or revoke an account's right to log in
#[tracing::instrument(skip_all, fields(username = %username))]
pub async fn set_approval(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<ApprovalResponse>, Error> {
    state.users.set_approved(&username, request.approved).await?;

    tracing::info!(approved = request.approved, "User approval updated");

    Ok(Json(ApprovalResponse {
        username,
        approved: request.approved,
    }))
}

/// Login with username and password
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Json(request): Json<LoginRequest>,
) -> Result<LoginResponse, Error> {
    let login = state.users.find_login(&request.username).await?.ok_or_else(invalid_credentials)?;
    let password_hash = login.password_hash.ok_or_else(invalid_credentials)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    if !password::verify_blocking(request.password, password_hash).await? {
        return Err(invalid_credentials());
    }

    if !login.approved {
        tracing::debug!(username = %request.username, "Login refused, account awaiting approval");
        return Err(invalid_credentials());
    }

    let role = state
        .users
        .find_role(&request.username)
        .await?
        .ok_or_else(invalid_credentials)?;

    let token = state.tokens.issue()?;

    let session = &state.config.auth.session;
    let transport = CookieTransport::for_request(&headers, &uri);
    let mut cookies = HeaderMap::new();
    cookies::set_cookie(&mut cookies, transport, &session.token_cookie_name, &token)?;
    cookies::set_cookie(&mut cookies, transport, &session.username_cookie_name, &request.username)?;

    tracing::info!(username = %request.username, ?role, "User logged in");

    Ok(LoginResponse {
        auth_response: AuthResponse {
            username: request.username,
            role,
            token,
        },
        cookies,
    })
}

/// Logout (clear session cookies)
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Result<LogoutResponse, Error> {
    let session = &state.config.auth.session;
    let transport = CookieTransport::for_request(&headers, &uri);
    let mut cookies = HeaderMap::new();
    cookies::remove_cookie(&mut cookies, transport, &session.token_cookie_name)?;
    cookies::remove_cookie(&mut cookies, transport, &session.username_cookie_name)?;

    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookies,
    })
}

/// List every role a user can hold
#[tracing::instrument(skip_all)]
pub async fn list_roles() -> Json<Vec<Role>> {
    Json(Role::ALL.to_vec())
}

/// The authenticated caller
#[tracing::instrument(skip_all)]
pub async fn get_current_principal(principal: Principal) -> Json<Principal> {
    Json(principal)
}
