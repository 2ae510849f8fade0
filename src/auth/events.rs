use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use tracing::{info, warn};

/// Receives authentication events. Injected through `AppState`.
pub trait AuthEvents: Send + Sync {
    fn logged_in(&self, username: &str, client_ip: Option<IpAddr>);
    fn logged_out(&self, username: &str, client_ip: Option<IpAddr>);
    fn login_failed(&self, username: &str, client_ip: Option<IpAddr>);
}

/// Writes auth events to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuthEvents;

fn show(ip: Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".into())
}

impl AuthEvents for TracingAuthEvents {
    fn logged_in(&self, username: &str, client_ip: Option<IpAddr>) {
        info!(user = %username, ip = %show(client_ip), "user logged in");
    }

    fn logged_out(&self, username: &str, client_ip: Option<IpAddr>) {
        info!(user = %username, ip = %show(client_ip), "user logged out");
    }

    fn login_failed(&self, username: &str, client_ip: Option<IpAddr>) {
        warn!(user = %username, ip = %show(client_ip), "invalid login attempt");
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or_else(|| peer.map(|p| p.ip()))
}
