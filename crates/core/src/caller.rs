use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, UserId};

/// Role that lets a principal bypass admin-bypassable policies.
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated identity attached to a gated invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// The acting user.
    pub id: UserId,
    /// Roles granted to the user.
    #[serde(default)]
    pub roles: Vec<String>,
    /// How the caller authenticated (`"jwt"`, `"api_key"`, ...).
    pub auth_method: String,
}

impl Principal {
    /// Create a principal with the given roles.
    #[must_use]
    pub fn new(
        id: impl Into<UserId>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        auth_method: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            auth_method: auth_method.into(),
        }
    }

    /// Whether the principal holds the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether the principal holds the administrative role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Per-invocation context carried into the guard.
///
/// The customer is always known (it keys the quota); the principal is
/// present only for authenticated calls, and its absence on a protected
/// operation is an error, not a quota denial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    /// Customer whose quota gates the call.
    pub customer: CustomerId,
    /// Authenticated identity, when there is one.
    #[serde(default)]
    pub principal: Option<Principal>,
    /// Free-form attributes forwarded to the authority with the request.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl CallContext {
    /// Create a context for an authenticated call.
    #[must_use]
    pub fn new(customer: impl Into<CustomerId>, principal: Principal) -> Self {
        Self {
            customer: customer.into(),
            principal: Some(principal),
            attributes: HashMap::new(),
        }
    }

    /// Create a context with no principal (e.g. an unauthenticated edge).
    #[must_use]
    pub fn anonymous(customer: impl Into<CustomerId>) -> Self {
        Self {
            customer: customer.into(),
            principal: None,
            attributes: HashMap::new(),
        }
    }

    /// Attach an attribute forwarded to the authority.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
