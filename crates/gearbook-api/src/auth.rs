// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-header authentication for the availability API.
//!
//! Every request carries a primary key header and a secondary token header;
//! both must match one configured client entry. The secondary compare is
//! constant-time. A client with an empty permission list may call anything,
//! otherwise the method's permission string must be listed.
//!
//! When auth is required but no clients are configured, all requests are
//! rejected (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use constant_time_eq::constant_time_eq;
use gearbook_core::GearbookError;
use tracing::error;

use crate::handlers::error_response;

/// One configured API client.
#[derive(Clone)]
pub struct ApiClient {
    /// Client name, used in logs only.
    pub name: String,
    /// Primary key, sent in the key header.
    pub key: String,
    /// Secondary token, sent in the extra header.
    pub extra: String,
    /// Allowed permission strings. Empty list = allow-all.
    pub permissions: Vec<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("name", &self.name)
            .field("key", &"[redacted]")
            .field("extra", &"[redacted]")
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Authentication settings and the client table, keyed by primary key.
#[derive(Clone)]
pub struct ApiAuth {
    key_header: String,
    extra_header: String,
    require_auth: bool,
    clients: HashMap<String, ApiClient>,
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAuth")
            .field("key_header", &self.key_header)
            .field("extra_header", &self.extra_header)
            .field("require_auth", &self.require_auth)
            .field("clients", &self.clients.len())
            .finish()
    }
}

impl ApiAuth {
    pub fn new(
        key_header: impl Into<String>,
        extra_header: impl Into<String>,
        require_auth: bool,
        clients: Vec<ApiClient>,
    ) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.key.clone(), client))
            .collect();
        Self {
            key_header: key_header.into(),
            extra_header: extra_header.into(),
            require_auth,
            clients,
        }
    }

    /// Name of the primary key header.
    pub fn key_header(&self) -> &str {
        &self.key_header
    }

    /// Name of the secondary token header.
    pub fn extra_header(&self) -> &str {
        &self.extra_header
    }

    /// Value for `Access-Control-Allow-Headers`, including the auth headers.
    pub fn cors_allow_headers(&self) -> String {
        format!(
            "content-type,x-request-id,{},{}",
            self.key_header, self.extra_header
        )
    }

    /// Validate a header pair against the client table.
    ///
    /// Transport-neutral: the HTTP middleware and the gRPC interceptor both
    /// feed their header values through here.
    pub fn authenticate(
        &self,
        key: Option<&str>,
        extra: Option<&str>,
    ) -> Result<AuthedClient, GearbookError> {
        if !self.require_auth {
            return Ok(AuthedClient::anonymous());
        }
        if self.clients.is_empty() {
            error!("auth required but no api clients configured -- rejecting request");
            return Err(GearbookError::Unauthenticated(
                "no api clients configured".to_string(),
            ));
        }
        let key = key.ok_or_else(|| {
            GearbookError::Unauthenticated(format!("missing {} header", self.key_header))
        })?;
        let extra = extra.ok_or_else(|| {
            GearbookError::Unauthenticated(format!("missing {} header", self.extra_header))
        })?;
        let client = self
            .clients
            .get(key)
            .ok_or_else(|| GearbookError::Unauthenticated("unknown api key".to_string()))?;
        if !constant_time_eq(client.extra.as_bytes(), extra.as_bytes()) {
            return Err(GearbookError::Unauthenticated(
                "secondary token mismatch".to_string(),
            ));
        }
        Ok(AuthedClient {
            name: client.name.clone(),
            key: Some(client.key.clone()),
            permissions: client.permissions.clone(),
        })
    }
}

/// The client a request authenticated as. Carried in request extensions.
#[derive(Debug, Clone)]
pub struct AuthedClient {
    pub name: String,
    /// Primary key; doubles as the rate limiter key. `None` for anonymous.
    pub key: Option<String>,
    pub permissions: Vec<String>,
}

impl AuthedClient {
    /// The allow-all client used when auth is disabled (local dev).
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
            key: None,
            permissions: Vec::new(),
        }
    }

    /// Check one permission string. Empty list = allow-all.
    pub fn require(&self, permission: &str) -> Result<(), GearbookError> {
        if self.permissions.is_empty() || self.permissions.iter().any(|p| p == permission) {
            Ok(())
        } else {
            Err(GearbookError::PermissionDenied(format!(
                "missing permission {permission}"
            )))
        }
    }
}

/// Permission required for a request path.
pub(crate) fn required_permission(path: &str) -> &'static str {
    if path.starts_with("/api/v1/items") {
        "read:items"
    } else {
        "read:availability"
    }
}

/// Middleware validating the two auth headers and the route permission.
///
/// On success the matched client lands in request extensions for the rate
/// limiter and handlers.
pub async fn auth_middleware(
    State(auth): State<Arc<ApiAuth>>,
    mut request: Request,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get(auth.key_header())
        .and_then(|v| v.to_str().ok());
    let extra = request
        .headers()
        .get(auth.extra_header())
        .and_then(|v| v.to_str().ok());

    let client = match auth.authenticate(key, extra) {
        Ok(client) => client,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = client.require(required_permission(request.uri().path())) {
        return error_response(&e);
    }

    request.extensions_mut().insert(client);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ApiAuth {
        ApiAuth::new(
            "x-api-key",
            "x-api-extra",
            true,
            vec![
                ApiClient {
                    name: "ops".to_string(),
                    key: "k-ops".to_string(),
                    extra: "s-ops".to_string(),
                    permissions: Vec::new(),
                },
                ApiClient {
                    name: "kiosk".to_string(),
                    key: "k-kiosk".to_string(),
                    extra: "s-kiosk".to_string(),
                    permissions: vec!["read:availability".to_string()],
                },
            ],
        )
    }

    #[test]
    fn both_headers_must_match() {
        let auth = table();
        assert!(auth.authenticate(Some("k-ops"), Some("s-ops")).is_ok());

        for (key, extra) in [
            (Some("k-ops"), Some("wrong")),
            (Some("unknown"), Some("s-ops")),
            (None, Some("s-ops")),
            (Some("k-ops"), None),
        ] {
            let err = auth.authenticate(key, extra).unwrap_err();
            assert!(matches!(err, GearbookError::Unauthenticated(_)));
        }
    }

    #[test]
    fn empty_permission_list_allows_everything() {
        let auth = table();
        let ops = auth.authenticate(Some("k-ops"), Some("s-ops")).unwrap();
        assert!(ops.require("read:availability").is_ok());
        assert!(ops.require("read:items").is_ok());
    }

    #[test]
    fn listed_permissions_are_enforced_exactly() {
        let auth = table();
        let kiosk = auth.authenticate(Some("k-kiosk"), Some("s-kiosk")).unwrap();
        assert!(kiosk.require("read:availability").is_ok());
        let err = kiosk.require("read:items").unwrap_err();
        assert!(matches!(err, GearbookError::PermissionDenied(_)));
    }

    #[test]
    fn disabled_auth_yields_anonymous_allow_all() {
        let auth = ApiAuth::new("x-api-key", "x-api-extra", false, Vec::new());
        let client = auth.authenticate(None, None).unwrap();
        assert_eq!(client.name, "anonymous");
        assert!(client.key.is_none());
        assert!(client.require("read:items").is_ok());
    }

    #[test]
    fn required_auth_with_no_clients_rejects_everyone() {
        let auth = ApiAuth::new("x-api-key", "x-api-extra", true, Vec::new());
        let err = auth.authenticate(Some("k-ops"), Some("s-ops")).unwrap_err();
        assert!(matches!(err, GearbookError::Unauthenticated(_)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let auth = table();
        let debug = format!("{auth:?}");
        assert!(!debug.contains("k-ops"));
        assert!(!debug.contains("s-ops"));

        let client = ApiClient {
            name: "ops".to_string(),
            key: "k-ops".to_string(),
            extra: "s-ops".to_string(),
            permissions: Vec::new(),
        };
        let debug = format!("{client:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("k-ops"));
    }

    #[test]
    fn items_route_needs_the_items_permission() {
        assert_eq!(required_permission("/api/v1/items"), "read:items");
        assert_eq!(
            required_permission("/api/v1/availability/camera"),
            "read:availability"
        );
        assert_eq!(
            required_permission("/api/v1/availability/bulk"),
            "read:availability"
        );
    }
}
