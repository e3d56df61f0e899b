//! Identity of the caller, resolved from a bearer token.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Validates bearer tokens issued by the identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Extracts the token of an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// A fixed token to user table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    users: HashMap<String, AuthenticatedUser>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        self.users.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}
