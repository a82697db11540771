//! Client IP extraction for the audit log.
//!
//! The address is taken from proxy headers in the order `CF-Connecting-IP`
//! → `X-Forwarded-For` (leftmost entry) → `X-Real-IP`, falling back to
//! `"0.0.0.0"`.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Axum extractor yielding the best-known client address. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let ip = extract_ip(&parts.headers);
        async move { Ok(ClientIp(ip)) }
    }
}

pub fn extract_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    if let Some(ip) = header("cf-connecting-ip") {
        return ip.to_string();
    }

    // X-Forwarded-For: client, proxy1, proxy2; leftmost is the client.
    if let Some(ip) = header("x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = header("x-real-ip") {
        return ip.to_string();
    }

    UNKNOWN_IP.to_string()
}
