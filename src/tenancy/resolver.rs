use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, Request, Uri};
use serde::Serialize;

use crate::config::{ConfigError, TenancyConfig};
use super::context::TenantId;

/// Which strategy produced a tenant id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Header,
    QueryParam,
    Subdomain,
    PathSegment,
    Default,
}

/// One link of the resolution chain. Each variant is a pure function of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Header(HeaderName),
    QueryParam(String),
    Subdomain,
    PathSegment { prefix: String },
    Default { tenant: TenantId, paths: Vec<String> },
}

impl Strategy {
    pub fn source(&self) -> ResolutionSource {
        match self {
            Strategy::Header(_) => ResolutionSource::Header,
            Strategy::QueryParam(_) => ResolutionSource::QueryParam,
            Strategy::Subdomain => ResolutionSource::Subdomain,
            Strategy::PathSegment { .. } => ResolutionSource::PathSegment,
            Strategy::Default { .. } => ResolutionSource::Default,
        }
    }

    pub fn extract(&self, request: &RequestAttributes<'_>) -> Option<TenantId> {
        match self {
            Strategy::Header(name) => request
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(TenantId::parse),
            Strategy::QueryParam(name) => request.query_value(name).and_then(|v| TenantId::parse(&v)),
            Strategy::Subdomain => request.host().and_then(subdomain_of),
            Strategy::PathSegment { prefix } => request
                .path()
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.split('/').next())
                .and_then(TenantId::parse),
            Strategy::Default { tenant, paths } => paths
                .iter()
                .any(|p| matches_prefix(request.path(), p))
                .then(|| tenant.clone()),
        }
    }
}

/// Prefix match on path-segment boundaries. A prefix ending in `/` matches
/// anything below it; otherwise `/health` matches `/health` and `/health/db`
/// but not `/healthy`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// First label of a host with more than two labels. IP literals have no subdomain.
fn subdomain_of(host: &str) -> Option<TenantId> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 {
        TenantId::parse(labels[0])
    } else {
        None
    }
}

/// The parts of an inbound request tenant resolution looks at
#[derive(Debug, Clone, Copy)]
pub struct RequestAttributes<'a> {
    headers: &'a HeaderMap,
    uri: &'a Uri,
}

impl<'a> RequestAttributes<'a> {
    pub fn new(headers: &'a HeaderMap, uri: &'a Uri) -> Self {
        Self { headers, uri }
    }

    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self::new(request.headers(), request.uri())
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Host without port, from the `Host` header or an absolute request URI.
    pub fn host(&self) -> Option<&str> {
        let raw = self
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.uri.host())?;

        if raw.starts_with('[') {
            // IPv6 literal, never a tenant subdomain
            return None;
        }
        let host = raw.split(':').next().unwrap_or(raw).trim();
        (!host.is_empty()).then_some(host)
    }

    /// Decoded value of the first query parameter named `name`.
    pub fn query_value(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tenant_id: TenantId,
    pub source: ResolutionSource,
}

/// Ordered strategy chain: header, query parameter, subdomain, path segment, default.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    strategies: Vec<Strategy>,
}

impl TenantResolver {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    /// Build the chain from config, skipping disabled strategies.
    pub fn from_config(config: &TenancyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut strategies = Vec::new();
        let header_name = config.header_name.trim();
        if !header_name.is_empty() {
            let name = HeaderName::from_bytes(header_name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeaderName(config.header_name.clone()))?;
            strategies.push(Strategy::Header(name));
        }
        if !config.query_param.trim().is_empty() {
            strategies.push(Strategy::QueryParam(config.query_param.trim().to_string()));
        }
        if config.subdomain_enabled {
            strategies.push(Strategy::Subdomain);
        }
        if let Some(prefix) = &config.path_prefix {
            strategies.push(Strategy::PathSegment {
                prefix: prefix.clone(),
            });
        }
        if let Some(tenant) = config.default_tenant.as_deref().and_then(TenantId::parse) {
            strategies.push(Strategy::Default {
                tenant,
                paths: config.default_tenant_paths.clone(),
            });
        }

        Ok(Self::new(strategies))
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// First non-blank candidate along the full chain.
    pub fn resolve(&self, request: &RequestAttributes<'_>) -> Option<Resolution> {
        self.resolve_with(request, |_| true)
    }

    /// Same order, request attributes only: the default tenant is never applied.
    pub fn resolve_from_attributes(&self, request: &RequestAttributes<'_>) -> Option<Resolution> {
        self.resolve_with(request, |s| !matches!(s, Strategy::Default { .. }))
    }

    fn resolve_with(
        &self,
        request: &RequestAttributes<'_>,
        include: impl Fn(&Strategy) -> bool,
    ) -> Option<Resolution> {
        self.strategies
            .iter()
            .filter(|s| include(s))
            .find_map(|strategy| {
                strategy.extract(request).map(|tenant_id| Resolution {
                    tenant_id,
                    source: strategy.source(),
                })
            })
    }
}
