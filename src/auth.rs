use std::{fmt, str::FromStr, sync::Arc};

use axum::{
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use subtle::ConstantTimeEq;

use crate::{
    config::AuthConfig,
    error::{BooksError, BooksResult, ErrorBody},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Accountant,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Accountant => "accountant",
            Role::Reader => "reader",
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::Accountant => matches!(permission, Permission::Read | Permission::Write | Permission::Reports),
            Role::Reader => matches!(permission, Permission::Read | Permission::Reports),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "accountant" => Ok(Role::Accountant),
            "reader" => Ok(Role::Reader),
            other => Err(format!("unknown role {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// List and fetch anything.
    Read,
    /// Create and edit documents, contacts, products and payments.
    Write,
    /// Delete contacts and products.
    DeleteMaster,
    /// Company settings, taxes, currencies and the chart of accounts.
    Admin,
    Reports,
}

/// Authenticated caller identity, available to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub name: String,
    pub role: Role,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        CallerIdentity {
            name: "anonymous".to_string(),
            role: Role::Admin,
        }
    }

    pub fn require(&self, permission: Permission) -> BooksResult<()> {
        if self.role.allows(permission) {
            return Ok(());
        }
        tracing::warn!(caller = %self.name, role = %self.role, ?permission, "Permission denied");
        Err(BooksError::Forbidden(format!(
            "role {} may not perform this action",
            self.role
        )))
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub async fn auth_middleware<B>(
    Extension(config): Extension<Arc<AuthConfig>>,
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    if !config.enabled {
        req.extensions_mut().insert(CallerIdentity::anonymous());
        return next.run(req).await;
    }

    let api_key = req
        .headers()
        .get("X-API-Key")
        .or_else(|| req.headers().get(header::AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s));

    let Some(key) = api_key else {
        return unauthorized("Missing API key. Provide X-API-Key header or Authorization: Bearer <key>");
    };

    match config
        .api_keys
        .iter()
        .find(|entry| entry.key.as_bytes().ct_eq(key.as_bytes()).into())
    {
        Some(entry) => {
            let role = match entry.role.parse::<Role>() {
                Ok(role) => role,
                Err(e) => {
                    // Misconfigured keys get the least privilege.
                    tracing::warn!(caller = %entry.name, error = %e, "Falling back to reader role");
                    Role::Reader
                }
            };
            tracing::debug!(caller = %entry.name, %role, "Authenticated request");
            req.extensions_mut().insert(CallerIdentity {
                name: entry.name.clone(),
                role,
            });
            next.run(req).await
        }
        None => {
            tracing::warn!("Invalid API key presented");
            unauthorized("Invalid API key")
        }
    }
}
