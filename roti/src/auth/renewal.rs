//! Sliding session renewal.
//!
//! After a request has been handled, a session token that is close to expiry is swapped for a
//! fresh one by appending a `Set-Cookie` to the response. Renewal never runs when the request was
//! rejected with `401` or on the logout route, and it only looks at tokens sent as cookies.
//!
//! The middleware wraps the whole router, fallback included: a request to an unknown path never
//! meets an access gate, yet its `404` still carries a renewed cookie when the presented token
//! verifies and is close to expiry.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{
    AppState,
    auth::{
        cookies::{self, CookieTransport, read_cookie},
        token::TokenService,
    },
    config::Config,
};

/// What renewal needs to know about a request once the handler has consumed it.
pub struct RenewalContext {
    on_logout_route: bool,
    presented_token: Option<String>,
    transport: CookieTransport,
}

impl RenewalContext {
    pub fn capture(request: &Request, config: &Config) -> Self {
        let session = &config.auth.session;
        let headers = request.headers();

        // Both cookies must be present for the cookie session to count
        let presented_token = match (
            read_cookie(headers, &session.token_cookie_name),
            read_cookie(headers, &session.username_cookie_name),
        ) {
            (Some(token), Some(_)) => Some(token.into_owned()),
            _ => None,
        };

        Self {
            on_logout_route: is_logout_path(request.uri().path(), &config.auth.logout_path),
            presented_token,
            transport: CookieTransport::for_request(headers, request.uri()),
        }
    }
}

fn is_logout_path(path: &str, logout_path: &str) -> bool {
    let normalize = |p: &str| {
        let trimmed = p.trim_end_matches('/');
        if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
    };
    normalize(path) == normalize(logout_path)
}

/// Append a renewed token cookie to `response` if the presented token is almost expired.
///
/// Failures to issue or encode the new token are logged and leave the response untouched.
pub fn renew_session(tokens: &TokenService, config: &Config, context: RenewalContext, response: &mut Response) {
    if response.status() == StatusCode::UNAUTHORIZED || context.on_logout_route {
        return;
    }

    let Some(token) = context.presented_token else {
        return;
    };

    let session = &config.auth.session;
    if !tokens.is_almost_expired(&token, session.renewal_window_days()) {
        return;
    }

    let renewed = match tokens.issue() {
        Ok(renewed) => renewed,
        Err(e) => {
            warn!("Failed to issue renewed session token: {e}");
            return;
        }
    };

    match cookies::set_cookie(response.headers_mut(), context.transport, &session.token_cookie_name, &renewed) {
        Ok(()) => debug!("Renewed session token"),
        Err(e) => warn!("Failed to set renewed session cookie: {e}"),
    }
}

/// Router-wide middleware running [`renew_session`] on every response.
pub async fn session_renewal_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let context = RenewalContext::capture(&request, &state.config);
    let mut response = next.run(request).await;
    renew_session(&state.tokens, &state.config, context, &mut response);
    response
}
