//! Allow-list middleware for HTTP requests.
//!
//! Rejects requests whose host or client IP is not on the configured lists.
//! Each list is only enforced when it is non-empty.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};

use crate::config::AccessConfig;
use crate::rest::ProblemDetails;
use crate::security::{
    client_ip, is_domain_allowed, is_ip_allowed, log_security_event, request_host,
    SecurityContext,
};

/// Parsed allow-lists shared across requests.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_domains: Vec<String>,
    allowed_ips: Vec<IpAddr>,
    trust_forwarded_for: bool,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    Domain,
    Ip,
}

impl AccessDenied {
    const fn event(self) -> &'static str {
        match self {
            Self::Domain => "domain_not_allowed",
            Self::Ip => "ip_not_allowed",
        }
    }

    const fn detail(self) -> &'static str {
        match self {
            Self::Domain => "Requests from this domain are not allowed",
            Self::Ip => "Requests from this address are not allowed",
        }
    }
}

impl AccessPolicy {
    /// Build from configuration. Unparseable IPs are skipped
    /// (`Config::validate` rejects them earlier).
    #[must_use]
    pub fn from_config(config: &AccessConfig) -> Arc<Self> {
        Arc::new(Self {
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            allowed_ips: config
                .allowed_ips
                .iter()
                .filter_map(|ip| ip.parse().ok())
                .collect(),
            trust_forwarded_for: config.trust_forwarded_for,
        })
    }

    /// Check a request against both lists.
    ///
    /// # Errors
    /// Returns which list refused the request.
    pub fn check(&self, request: &Request) -> Result<(), AccessDenied> {
        if !self.allowed_domains.is_empty() {
            let allowed = request_host(request.headers(), request.uri())
                .is_some_and(|host| is_domain_allowed(&host, &self.allowed_domains));
            if !allowed {
                return Err(AccessDenied::Domain);
            }
        }

        if !self.allowed_ips.is_empty() {
            let allowed = client_ip(request, self.trust_forwarded_for)
                .is_some_and(|ip| is_ip_allowed(ip, &self.allowed_ips));
            if !allowed {
                return Err(AccessDenied::Ip);
            }
        }

        Ok(())
    }
}

/// Middleware enforcing the [`AccessPolicy`] from an `Extension`.
///
/// # Example
///
/// ```ignore
/// let policy = AccessPolicy::from_config(&config.access);
///
/// let app = Router::new()
///     // ... routes ...
///     .layer(middleware::from_fn(allowlist_middleware))
///     .layer(Extension(policy));
/// ```
pub async fn allowlist_middleware(
    Extension(policy): Extension<Arc<AccessPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(denied) = policy.check(&request) {
        let context = SecurityContext::from_request(&request, policy.trust_forwarded_for);
        log_security_event(denied.event(), &context);
        return ProblemDetails::forbidden(denied.detail()).into_response();
    }
    next.run(request).await
}
