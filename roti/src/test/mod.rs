//! End-to-end tests through the full router: gate, renewal, handlers and cookies together.

use axum::http::{
    HeaderValue, StatusCode,
    header::{AUTHORIZATION, COOKIE, HOST, SET_COOKIE},
};
use axum_test::{TestResponse, TestServer};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;

use crate::{
    AppState,
    api::models::users::{AuthResponse, LoginRequest},
    db::users::InMemoryUsers,
    errors::LookupUnavailable,
    test_utils::{
        FailingUsers, bearer_pair, create_test_config, create_test_server, create_test_state, create_test_users, hash_for_tests,
        session_cookie,
    },
    types::{Principal, Role},
};

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap()
}

fn token_cookies(response: &TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with("USER_TOKEN="))
        .map(str::to_string)
        .collect()
}

fn cookie_value(set_cookie: &str) -> &str {
    let pair = set_cookie.split(';').next().unwrap_or_default();
    pair.split_once('=').map(|(_, value)| value).unwrap_or_default()
}

fn setup() -> (AppState, InMemoryUsers, TestServer) {
    let users = create_test_users();
    let state = create_test_state(create_test_config(), users.clone());
    let server = create_test_server(state.clone());
    (state, users, server)
}

#[tokio::test]
async fn test_expired_token_is_rejected_without_detail() {
    let (state, _, server) = setup();
    let expired = state.tokens.issue_until(Utc::now() - TimeDelta::days(1)).unwrap();

    let response = server
        .get("/api/users/me")
        .add_header(COOKIE, header_value(&session_cookie(&expired, "alice")))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    response.assert_text("");
    assert!(token_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_role_outside_permission_set_is_rejected() {
    let (state, _, server) = setup();
    let token = state.tokens.issue().unwrap();

    let response = server
        .get("/api/users/roles")
        .add_header(COOKIE, header_value(&session_cookie(&token, "alice")))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    response.assert_text("");
}

#[tokio::test]
async fn test_public_route_needs_no_credentials() {
    let (_, _, server) = setup();

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("OK");

    // Garbage credentials do not matter either
    let response = server
        .get("/healthz")
        .add_header(AUTHORIZATION, header_value("Bearer nonsense:nobody"))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_nearly_expired_session_is_renewed() {
    let (state, _, server) = setup();
    let old = state.tokens.issue_until(Utc::now() + TimeDelta::hours(12)).unwrap();

    let response = server
        .get("/api/users/me")
        .add_header(HOST, header_value("roti.example.com"))
        .add_header(COOKIE, header_value(&session_cookie(&old, "alice")))
        .await;

    response.assert_status_ok();
    let principal: Principal = response.json();
    assert_eq!(principal.username, "alice");

    let renewed = token_cookies(&response);
    assert_eq!(renewed.len(), 1);
    let new_token = cookie_value(&renewed[0]);
    assert_ne!(new_token, old);
    assert!(state.tokens.verify(new_token));
    assert!(!state.tokens.is_almost_expired(new_token, 1));
    assert!(renewed[0].ends_with("; Path=/; HttpOnly; Secure; SameSite=None"));
}

#[tokio::test]
async fn test_renewal_uses_plain_cookie_for_localhost() {
    let (state, _, server) = setup();
    let old = state.tokens.issue_until(Utc::now() + TimeDelta::hours(2)).unwrap();

    let response = server
        .get("/api/users/me")
        .add_header(HOST, header_value("127.0.0.1:7000"))
        .add_header(COOKIE, header_value(&session_cookie(&old, "alice")))
        .await;

    response.assert_status_ok();
    let renewed = token_cookies(&response);
    assert_eq!(renewed.len(), 1);
    assert!(renewed[0].ends_with("; Path=/"));
    assert!(!renewed[0].contains("Secure"));
}

#[tokio::test]
async fn test_fresh_session_is_not_renewed() {
    let (state, _, server) = setup();
    let token = state.tokens.issue().unwrap();

    let response = server
        .get("/api/users/me")
        .add_header(COOKIE, header_value(&session_cookie(&token, "alice")))
        .await;

    response.assert_status_ok();
    assert!(token_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_bearer_pair_authenticates() {
    let (state, _, server) = setup();
    let token = state.tokens.issue().unwrap();

    let response = server
        .get("/api/users/roles")
        .add_header(AUTHORIZATION, header_value(&bearer_pair(&token, "root")))
        .await;

    response.assert_status_ok();
    let roles: Vec<Role> = response.json();
    assert_eq!(roles.len(), 3);
}

#[tokio::test]
async fn test_bearer_sessions_are_never_renewed() {
    let (state, _, server) = setup();
    let old = state.tokens.issue_until(Utc::now() + TimeDelta::hours(12)).unwrap();

    let response = server
        .get("/api/users/me")
        .add_header(AUTHORIZATION, header_value(&bearer_pair(&old, "alice")))
        .await;

    response.assert_status_ok();
    assert!(token_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_no_renewal_on_rejected_request() {
    let (state, _, server) = setup();
    let old = state.tokens.issue_until(Utc::now() + TimeDelta::hours(12)).unwrap();

    let response = server
        .get("/api/users/roles")
        .add_header(COOKIE, header_value(&session_cookie(&old, "alice")))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(token_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_logout_is_not_undone_by_renewal() {
    let (state, _, server) = setup();
    let old = state.tokens.issue_until(Utc::now() + TimeDelta::hours(12)).unwrap();

    let response = server
        .post("/api/users/logout")
        .add_header(COOKIE, header_value(&session_cookie(&old, "alice")))
        .await;

    response.assert_status_ok();
    let cookies = token_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookie_value(&cookies[0]), "");
    assert!(cookies[0].contains("Max-Age=0"));
}

#[tokio::test]
async fn test_role_change_applies_to_next_request() {
    let (state, users, server) = setup();
    let token = state.tokens.issue().unwrap();
    let request_cookie = session_cookie(&token, "alice");

    let response = server.get("/api/users/roles").add_header(COOKIE, header_value(&request_cookie)).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    users.set_role("alice", Role::Admin);

    let response = server.get("/api/users/roles").add_header(COOKIE, header_value(&request_cookie)).await;
    response.assert_status_ok();

    users.remove("alice");

    let response = server.get("/api/users/me").add_header(COOKIE, header_value(&request_cookie)).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[test_log::test(tokio::test)]
async fn test_unavailable_directory_looks_like_a_denial() {
    let config = create_test_config();
    let state = AppState::builder()
        .tokens(Arc::new(crate::auth::token::TokenService::from_config(&config).unwrap()))
        .config(config)
        .users(Arc::new(FailingUsers))
        .build();
    let server = create_test_server(state.clone());
    let token = state.tokens.issue().unwrap();

    let response = server
        .get("/api/users/me")
        .add_header(COOKIE, header_value(&session_cookie(&token, "alice")))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    response.assert_text("");

    // Public routes never consult the directory
    server.get("/healthz").await.assert_status_ok();
}

#[tokio::test]
async fn test_lookup_failure_is_marked_for_outer_layers() {
    use crate::auth::gate::guarded;
    use axum::{Router, routing::get};
    use tower::ServiceExt;

    let config = create_test_config();
    let state = AppState::builder()
        .tokens(Arc::new(crate::auth::token::TokenService::from_config(&config).unwrap()))
        .config(config)
        .users(Arc::new(FailingUsers))
        .build();
    let token = state.tokens.issue().unwrap();
    let router: Router = Router::new()
        .route("/admin", guarded(get(|| async { "secret" }), &state, [Role::Admin]))
        .with_state(state);

    let request = axum::http::Request::builder()
        .uri("/admin")
        .header(COOKIE, session_cookie(&token, "root"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.extensions().get::<LookupUnavailable>().is_some());
}

#[tokio::test]
async fn test_dev_mode_opens_every_route() {
    let mut config = create_test_config();
    config.dev_mode = Some("1".to_string());
    let server = create_test_server(create_test_state(config, create_test_users()));

    let response = server.get("/api/users/roles").await;
    if cfg!(debug_assertions) {
        response.assert_status_ok();
    } else {
        // Release builds ignore the flag
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_empty_credentials_on_guest_route() {
    let users = InMemoryUsers::new();
    users.insert("alice", Role::NonAdmin, Some(hash_for_tests("wonderland")));
    let server = create_test_server(create_test_state(create_test_config(), users));

    // Login is a guest route: reachable with no session at all
    let response = server
        .post("/api/users/login")
        .json(&LoginRequest {
            username: "alice".to_string(),
            password: "wonderland".to_string(),
        })
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_login_then_use_session() {
    let users = InMemoryUsers::new();
    users.insert("alice", Role::NonAdmin, Some(hash_for_tests("wonderland")));
    let server = create_test_server(create_test_state(create_test_config(), users));

    let login = server
        .post("/api/users/login")
        .json(&LoginRequest {
            username: "alice".to_string(),
            password: "wonderland".to_string(),
        })
        .await;
    login.assert_status_ok();
    let auth: AuthResponse = login.json();

    // Via cookies
    let response = server
        .get("/api/users/me")
        .add_header(COOKIE, header_value(&session_cookie(&auth.token, &auth.username)))
        .await;
    response.assert_status_ok();

    // Via the bearer pair
    let response = server
        .get("/api/users/me")
        .add_header(AUTHORIZATION, header_value(&bearer_pair(&auth.token, &auth.username)))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_token_accepted_with_another_username() {
    // Tokens do not name their user: a token from alice's session works with root's username.
    let (state, _, server) = setup();
    let alice_token = state.tokens.issue().unwrap();

    let response = server
        .get("/api/users/roles")
        .add_header(COOKIE, header_value(&session_cookie(&alice_token, "root")))
        .await;

    response.assert_status_ok();
}
