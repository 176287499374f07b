//! Credential checking for authenticated procedures

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::RpcError;
use crate::params::CanonicalArgs;
use crate::procedure::{PASSWORD_ARGUMENT, Principal, USERNAME_ARGUMENT};

/// Collaborator that turns credentials into a principal.
///
/// May block (database or directory lookups). `Ok(None)` means the
/// credentials were rejected; `Err` is a failure of the checker itself.
#[async_trait]
pub trait CredentialChecker: Send + Sync {
    async fn check(&self, username: &str, password: &str) -> Result<Option<Principal>, RpcError>;
}

/// Fixed username/password table
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }
}

#[async_trait]
impl CredentialChecker for StaticCredentials {
    async fn check(&self, username: &str, password: &str) -> Result<Option<Principal>, RpcError> {
        Ok(match self.users.get(username) {
            Some(expected) if expected == password => Some(Principal::new(username)),
            _ => None,
        })
    }
}

/// Take the credentials out of `args` and check them.
///
/// Credentials are the `username` and `password` keywords when both are
/// present, otherwise the first two positional arguments. They are removed
/// from `args` only when the checker accepts them.
pub async fn authenticate(
    checker: &dyn CredentialChecker,
    args: &mut CanonicalArgs,
) -> Result<Principal, RpcError> {
    let keywords = (args.keyword.get(USERNAME_ARGUMENT), args.keyword.get(PASSWORD_ARGUMENT));
    let by_position = !matches!(keywords, (Some(_), Some(_)));
    let (username, password) = match keywords {
        (Some(username), Some(password)) => (username, password),
        _ if args.positional.len() >= 2 => (&args.positional[0], &args.positional[1]),
        _ => {
            return Err(RpcError::invalid_params(
                "Authenticated methods require at least [username, password] or {username: password:} arguments",
            ));
        }
    };

    let (Value::String(username), Value::String(password)) = (username, password) else {
        return Err(RpcError::invalid_params("username and password must be strings"));
    };

    let principal = checker
        .check(username, password)
        .await?
        .ok_or_else(|| RpcError::InvalidCredentials(String::new()))?;
    debug!("Authenticated principal '{}'", principal.username);

    if by_position {
        args.positional.drain(..2);
    } else {
        args.keyword.remove(USERNAME_ARGUMENT);
        args.keyword.remove(PASSWORD_ARGUMENT);
    }
    Ok(principal)
}
