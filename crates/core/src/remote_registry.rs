//! Partner servers from configuration.

use crate::collaborators::RemoteServerDirectory;
use crate::config::RemoteServerConfig;
use std::net::{IpAddr, ToSocketAddrs};

/// [`RemoteServerDirectory`] over the configured remote servers.
#[derive(Clone, Debug, Default)]
pub struct RemoteServerRegistry {
    servers: Vec<RemoteServerConfig>,
}

impl RemoteServerRegistry {
    pub fn new(servers: Vec<RemoteServerConfig>) -> Self {
        Self { servers }
    }

    pub fn servers(&self) -> &[RemoteServerConfig] {
        &self.servers
    }
}

impl RemoteServerDirectory for RemoteServerRegistry {
    fn authenticate(&self, remote_ip: Option<IpAddr>, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        for server in self.servers.iter().filter(|s| s.local_auth_token == token) {
            if !server.limit_accepted_ips {
                return Some(server.server_id.clone());
            }
            match remote_ip {
                Some(ip) if host_addresses(&server.base_url).contains(&ip) => {
                    return Some(server.server_id.clone());
                }
                _ => tracing::warn!(
                    "server [{}] presented a valid token from an unexpected address {:?}",
                    server.server_id,
                    remote_ip
                ),
            }
        }
        None
    }

    fn server(&self, server_id: &str) -> Option<RemoteServerConfig> {
        self.servers
            .iter()
            .find(|s| s.server_id == server_id)
            .cloned()
    }
}

/// Addresses the host of `base_url` resolves to. Empty if the URL or lookup fails.
fn host_addresses(base_url: &str) -> Vec<IpAddr> {
    let Ok(url) = reqwest::Url::parse(base_url) else {
        return Vec::new();
    };
    let Some(host) = url.host_str() else {
        return Vec::new();
    };
    let port = url.port_or_known_default().unwrap_or(443);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(err) => {
            tracing::warn!("could not resolve {}: {}", host, err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn server(id: &str, base_url: &str, token: &str, limit: bool) -> RemoteServerConfig {
        RemoteServerConfig {
            server_id: id.into(),
            name: None,
            base_url: base_url.into(),
            remote_auth_token: format!("{id}-out"),
            local_auth_token: token.into(),
            limit_accepted_ips: limit,
        }
    }

    #[test]
    fn token_identifies_server() {
        let registry = RemoteServerRegistry::new(vec![
            server("partner-a", "https://a.example.org", "secret-a", false),
            server("partner-b", "https://b.example.org", "secret-b", false),
        ]);

        assert_eq!(
            registry.authenticate(None, "secret-b").as_deref(),
            Some("partner-b")
        );
        assert!(registry.authenticate(None, "secret-c").is_none());
        assert!(registry.authenticate(None, "").is_none());
    }

    #[test]
    fn ip_limit_checks_resolved_host() {
        let registry = RemoteServerRegistry::new(vec![server(
            "partner-a",
            "http://127.0.0.1:8080/mme",
            "secret-a",
            true,
        )]);

        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let elsewhere = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
        assert_eq!(
            registry.authenticate(Some(localhost), "secret-a").as_deref(),
            Some("partner-a")
        );
        assert!(registry.authenticate(Some(elsewhere), "secret-a").is_none());
        assert!(registry.authenticate(None, "secret-a").is_none());
    }

    #[test]
    fn server_lookup_by_id() {
        let registry = RemoteServerRegistry::new(vec![server(
            "partner-a",
            "https://a.example.org",
            "secret-a",
            false,
        )]);
        assert!(registry.server("partner-a").is_some());
        assert!(registry.server("partner-z").is_none());
    }
}
