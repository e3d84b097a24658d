//! Security helpers: allow-list checks, capability checks, and security event logging.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header::HOST, HeaderMap, Uri},
};

/// Tracing target for security-relevant events.
pub const SECURITY_TARGET: &str = "security";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Role and permission checks on an authenticated user.
///
/// Implemented by the application's user type; the auth layer attaches the
/// user to each request as a [`CurrentUser`] extension.
pub trait Capabilities: Send + Sync {
    /// Stable identifier used in security logs.
    fn user_id(&self) -> String;

    fn has_role(&self, role: &str) -> bool;

    fn can(&self, ability: &str) -> bool;
}

/// The authenticated user for a request.
#[derive(Clone)]
pub struct CurrentUser(pub Arc<dyn Capabilities>);

impl CurrentUser {
    pub fn new(user: impl Capabilities + 'static) -> Self {
        Self(Arc::new(user))
    }
}

/// `false` when nobody is signed in.
#[must_use]
pub fn user_has_role(user: Option<&CurrentUser>, role: &str) -> bool {
    user.is_some_and(|u| u.0.has_role(role))
}

/// `false` when nobody is signed in.
#[must_use]
pub fn user_can(user: Option<&CurrentUser>, ability: &str) -> bool {
    user.is_some_and(|u| u.0.can(ability))
}

/// Exact, case-insensitive membership of `host` in `allowed`.
///
/// An empty list allows nothing.
#[must_use]
pub fn is_domain_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|d| d.eq_ignore_ascii_case(host))
}

/// Exact membership of `ip` in `allowed`. An empty list allows nothing.
#[must_use]
pub fn is_ip_allowed(ip: IpAddr, allowed: &[IpAddr]) -> bool {
    allowed.contains(&ip)
}

/// Host name of the request without port: `Host` header first, then the URI.
#[must_use]
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let raw = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.host())?;
    let host = strip_port(raw.trim());
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or_default();
    }
    match host.rsplit_once(':') {
        // A bare IPv6 address has more than one colon
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

/// Client address: the first `X-Forwarded-For` hop when trusted, otherwise
/// the peer address from `ConnectInfo`.
#[must_use]
pub fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Who and what a security event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    pub ip: Option<IpAddr>,
    pub user_id: Option<String>,
    pub url: String,
}

impl SecurityContext {
    #[must_use]
    pub fn from_request(request: &Request, trust_forwarded_for: bool) -> Self {
        Self {
            ip: client_ip(request, trust_forwarded_for),
            user_id: request
                .extensions()
                .get::<CurrentUser>()
                .map(|u| u.0.user_id()),
            url: request.uri().to_string(),
        }
    }
}

/// Emit a structured event on the `security` target.
pub fn log_security_event(event: &str, context: &SecurityContext) {
    tracing::info!(
        target: SECURITY_TARGET,
        event,
        ip = context.ip.map(|ip| ip.to_string()),
        user_id = context.user_id.as_deref(),
        url = %context.url,
        "security event"
    );
}
