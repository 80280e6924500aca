//! Identity and org-context middleware.
//!
//! Authentication itself lives at the platform gateway, which forwards the
//! verified identity as headers. This middleware turns those headers into a
//! typed [`Caller`] - identity, resolved org context, and network metadata -
//! and resolves the org context exactly once, so every consumer within a
//! request sees the same snapshot.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::org_context::OrgContext;
use crate::AppState;

/// Gateway-verified user identity header.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Explicit active-organization hint.
pub const ORG_HINT_HEADER: &str = "x-org-id";

/// The authenticated end user behind a request.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub email: String,
}

/// Network facts about the request, recorded alongside audit entries.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Everything downstream code may know about the caller. Built once per
/// request; an anonymous request carries an empty context.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub identity: Option<SessionIdentity>,
    pub context: OrgContext,
    pub meta: RequestMeta,
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_identity(headers: &HeaderMap) -> Option<SessionIdentity> {
    let raw_id = header_str(headers, USER_ID_HEADER)?;
    let user_id = match raw_id.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(header = USER_ID_HEADER, "ignoring malformed identity header");
            return None;
        }
    };
    let email = header_str(headers, USER_EMAIL_HEADER)?.to_string();
    Some(SessionIdentity { user_id, email })
}

fn parse_meta(headers: &HeaderMap) -> RequestMeta {
    let ip_address = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = header_str(headers, "user-agent").map(|v| v.to_string());
    RequestMeta {
        ip_address,
        user_agent,
    }
}

/// Resolve the caller once and stash it in request extensions.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let identity = parse_identity(headers);
    let meta = parse_meta(headers);
    let org_hint = header_str(headers, ORG_HINT_HEADER).and_then(|v| v.parse::<Uuid>().ok());

    let context = match &identity {
        Some(session) => match state.resolver.resolve(session.user_id, org_hint).await {
            Ok(context) => context,
            Err(e) => return e.into_response(),
        },
        None => OrgContext::default(),
    };

    request.extensions_mut().insert(Caller {
        identity,
        context,
        meta,
    });
    next.run(request).await
}

/// Extractor for [`Caller`] from request extensions.
#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("caller context not resolved")))
    }
}
