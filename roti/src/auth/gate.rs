//! Per-route authorization.
//!
//! Every route is declared with the set of roles it accepts and wrapped with
//! [`access_gate_middleware`] through [`guarded`]. For each request the gate decides, in order:
//!
//! 1. dev mode is on: allow
//! 2. the route is public (no roles, or `GUEST` among them): allow
//! 3. the token verifies *and* the username resolves to one of the route's roles: allow, and
//!    attach the [`Principal`] to the request
//! 4. otherwise: deny with an empty `401`
//!
//! Token verification and role lookup are independent checks; the token does not say which user
//! it was issued to.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::{credentials::Credentials, roles::RoleResolver, token::TokenService},
    config::SessionConfig,
    errors::Error,
    types::{Principal, RoutePermissions},
};

/// Outcome of the gate for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Dev mode admits everything without looking at credentials
    DevMode,
    /// The route accepts guests
    Public,
    /// Credentials verified and the role matches
    Authenticated(Principal),
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Deny)
    }
}

#[derive(Clone)]
pub struct AccessGate {
    dev_mode: bool,
    tokens: Arc<TokenService>,
    roles: RoleResolver,
}

impl AccessGate {
    pub fn new(dev_mode: bool, tokens: Arc<TokenService>, roles: RoleResolver) -> Self {
        Self { dev_mode, tokens, roles }
    }

    /// Decide whether a request with `credentials` may reach a route accepting `permitted`.
    ///
    /// The only error is a failed role lookup ([`Error::UserLookup`]), which callers surface as a
    /// denial.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn decide(&self, permitted: &RoutePermissions, credentials: &Credentials) -> Result<Decision, Error> {
        if self.dev_mode {
            trace!("Dev mode enabled, skipping authorization");
            return Ok(Decision::DevMode);
        }

        if permitted.is_public() {
            trace!("Route is public, skipping authorization");
            return Ok(Decision::Public);
        }

        let token_valid = self.tokens.verify(&credentials.token);
        // Looked up even when the token already failed, so both checks always run
        let role = self.roles.resolve(&credentials.username).await.map_err(Error::UserLookup)?;

        match role {
            Some(role) if token_valid && permitted.permits(role) => {
                trace!(?role, "Request authorized");
                Ok(Decision::Authenticated(Principal {
                    username: credentials.username.clone(),
                    role,
                }))
            }
            _ => {
                debug!(token_valid, ?role, "Request denied");
                Ok(Decision::Deny)
            }
        }
    }
}

/// State of the gate middleware on one route: the shared gate plus that route's roles.
#[derive(Clone)]
pub struct RouteGuard {
    gate: AccessGate,
    session: Arc<SessionConfig>,
    permissions: Arc<RoutePermissions>,
}

impl RouteGuard {
    pub fn new(state: &AppState, permissions: RoutePermissions) -> Self {
        Self {
            gate: state.access_gate(),
            session: Arc::new(state.config.auth.session.clone()),
            permissions: Arc::new(permissions),
        }
    }
}

pub(crate) async fn authorize(guard: &RouteGuard, mut request: Request) -> Result<Request, Error> {
    let credentials = Credentials::from_headers(request.headers(), &guard.session);

    match guard.gate.decide(&guard.permissions, &credentials).await? {
        Decision::Authenticated(principal) => {
            request.extensions_mut().insert(principal);
        }
        Decision::DevMode | Decision::Public => {}
        Decision::Deny => return Err(Error::Unauthenticated { message: None }),
    }

    Ok(request)
}

/// Middleware enforcing a route's permission set. Attach with [`guarded`].
pub async fn access_gate_middleware(State(guard): State<RouteGuard>, request: Request, next: Next) -> Result<Response, Error> {
    let request = authorize(&guard, request).await?;
    Ok(next.run(request).await)
}

/// Wrap a route so that only callers holding one of `permissions` reach it.
///
/// ```ignore
/// Router::new().route("/api/users/roles", guarded(get(list_roles), &state, [Role::Admin]))
/// ```
pub fn guarded<S>(route: MethodRouter<S>, state: &AppState, permissions: impl Into<RoutePermissions>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let guard = RouteGuard::new(state, permissions.into());
    route.route_layer(middleware::from_fn_with_state(guard, access_gate_middleware))
}
