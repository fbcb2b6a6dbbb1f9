use axum::http::Request;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tower_governor::{key_extractor::KeyExtractor, GovernorError};

use crate::common::OPERATOR_HEADER;

/// Rate-limit bucket key: the operator named in `X-Operator` when present,
/// otherwise the client IP.
///
/// IP resolution tries X-Forwarded-For, X-Real-IP, then the peer address, and
/// finally falls back to localhost so that requests without an identifiable
/// address share one bucket instead of bypassing the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorKeyExtractor;

impl OperatorKeyExtractor {
    fn client_ip<T>(req: &Request<T>) -> IpAddr {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }

        req.extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip())
    }
}

impl KeyExtractor for OperatorKeyExtractor {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let operator = req
            .headers()
            .get(OPERATOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        Ok(match operator {
            Some(name) => format!("operator:{name}"),
            None => format!("ip:{}", Self::client_ip(req)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn prefers_operator_over_ip() {
        let req = Request::builder()
            .header(OPERATOR_HEADER, " alice ")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(OperatorKeyExtractor.extract(&req).unwrap(), "operator:alice");
    }

    #[test]
    fn falls_back_through_ip_sources() {
        let forwarded = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(OperatorKeyExtractor.extract(&forwarded).unwrap(), "ip:10.0.0.1");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(OperatorKeyExtractor.extract(&bare).unwrap(), "ip:127.0.0.1");
    }
}
