//! Username to role resolution.

use std::sync::Arc;
use tracing::{instrument, trace};

use crate::{
    db::{errors::Result, users::UserDirectory},
    types::Role,
};

/// Resolves the role a username currently holds.
///
/// Every call goes to the directory; nothing is cached between requests.
#[derive(Clone)]
pub struct RoleResolver {
    users: Arc<dyn UserDirectory>,
}

impl RoleResolver {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// `Ok(None)` for unknown users (including the empty username); `Err` only when the directory
    /// itself could not be consulted.
    #[instrument(skip(self))]
    pub async fn resolve(&self, username: &str) -> Result<Option<Role>> {
        let role = self.users.find_role(username).await?;
        trace!(?role, "Resolved role");
        Ok(role)
    }
}
