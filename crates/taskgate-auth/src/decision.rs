//! Authorization decisions and the gateway policy document
//!
//! An [`AuthDecision`] carries no trace of why a request was denied; the
//! reason goes to logs and metrics only.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::jwt::VerifiedClaims;

/// Principal reported on every deny
pub const DENIED_PRINCIPAL: &str = "user";

/// Resource every decision applies to
pub const ANY_RESOURCE: &str = "*";

/// IAM policy language version expected by the gateway
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action granted or refused by a policy statement
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    /// Lowercase label, as used in metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// Outcome of one `authorize` call
///
/// `Allow` can only be built from [`VerifiedClaims`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    principal_id: String,
    effect: Effect,
    resource: String,
}

impl AuthDecision {
    /// Allow the token's subject on every resource
    pub fn allow(claims: &VerifiedClaims) -> Self {
        Self {
            principal_id: claims.subject().to_string(),
            effect: Effect::Allow,
            resource: ANY_RESOURCE.to_string(),
        }
    }

    /// The uniform deny
    pub fn deny() -> Self {
        Self {
            principal_id: DENIED_PRINCIPAL.to_string(),
            effect: Effect::Deny,
            resource: ANY_RESOURCE.to_string(),
        }
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }

    /// Render as the policy response a token authorizer returns to the gateway
    pub fn to_policy(&self) -> AuthorizerResponse {
        AuthorizerResponse {
            principal_id: self.principal_id.clone(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![Statement {
                    action: INVOKE_ACTION.to_string(),
                    effect: self.effect,
                    resource: self.resource.clone(),
                }],
            },
        }
    }
}

/// Token authorizer response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
}

/// IAM policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// Single policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: String,
    pub effect: Effect,
    pub resource: String,
}
