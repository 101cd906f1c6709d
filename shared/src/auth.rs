use crate::errors::ApiError;
use crate::ids::EntityKind;
use lambda_http::{Request, RequestExt};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The two layouts an authorizer can attach to a request.
///
/// HTTP APIs nest the Lambda authorizer's context under `lambda`; REST APIs
/// hand it over flat.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizerPayload {
    NestedLambda(Map<String, Value>),
    Flat(Map<String, Value>),
}

impl AuthorizerPayload {
    /// Classify raw authorizer fields. A `lambda` key that is not an object
    /// does not count as the nested layout.
    pub fn from_fields(fields: &HashMap<String, Value>) -> Self {
        match fields.get("lambda") {
            Some(Value::Object(nested)) => AuthorizerPayload::NestedLambda(nested.clone()),
            _ => AuthorizerPayload::Flat(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        }
    }

    fn fields(&self) -> &Map<String, Value> {
        match self {
            AuthorizerPayload::NestedLambda(map) | AuthorizerPayload::Flat(map) => map,
        }
    }

    /// String field or "" when missing or of another type.
    fn string_field(&self, name: &str) -> &str {
        self.fields()
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn resolve(&self) -> AuthorizationContext {
        AuthorizationContext::new(self.string_field("userId"), self.string_field("accountId"))
    }
}

/// Caller identity for one request. Both fields are set or both are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub user_id: String,
    pub account_id: String,
}

impl AuthorizationContext {
    pub fn new(user_id: &str, account_id: &str) -> Self {
        if user_id.is_empty() || account_id.is_empty() {
            return Self::default();
        }
        Self {
            user_id: user_id.to_string(),
            account_id: account_id.to_string(),
        }
    }

    /// Resolve the caller from the request's authorizer context.
    ///
    /// With `allow_identity_headers`, `X-User-Id` / `X-Account-Id` stand in
    /// for a missing authorizer (local development only).
    pub fn from_request(event: &Request, allow_identity_headers: bool) -> Self {
        let ctx = event
            .request_context_ref()
            .and_then(|rc| rc.authorizer())
            .map(|authorizer| AuthorizerPayload::from_fields(&authorizer.fields).resolve())
            .unwrap_or_default();

        if ctx.is_authenticated() || !allow_identity_headers {
            return ctx;
        }

        let header = |name: &str| {
            event
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let mut flat = Map::new();
        flat.insert("userId".to_string(), Value::String(header("X-User-Id")));
        flat.insert("accountId".to_string(), Value::String(header("X-Account-Id")));
        let ctx = AuthorizerPayload::Flat(flat).resolve();
        if ctx.is_authenticated() {
            tracing::warn!(user_id = %ctx.user_id, "Using identity headers in place of authorizer context");
        }
        ctx
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_empty() && !self.account_id.is_empty()
    }

    /// Turn an empty context into a 401.
    pub fn require(self) -> Result<Self, ApiError> {
        if self.is_authenticated() {
            Ok(self)
        } else {
            Err(ApiError::Auth("Unauthorized".to_string()))
        }
    }

    pub fn user_key(&self) -> String {
        EntityKind::User.key(&self.user_id)
    }

    pub fn account_key(&self) -> String {
        EntityKind::Account.key(&self.account_id)
    }

    /// 403 unless `owner_account` is the caller's account.
    pub fn ensure_account_access(&self, owner_account: &str) -> Result<(), ApiError> {
        if EntityKind::Account.key(owner_account) == self.account_key() {
            Ok(())
        } else {
            tracing::warn!(
                caller_account = %self.account_id,
                owner_account = %owner_account,
                "Cross-account access denied"
            );
            Err(ApiError::access_denied())
        }
    }
}
