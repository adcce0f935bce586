//! Resolution of the tuner backend's base URL.
//!
//! The locator is shared by every request handler and re-read per request.
//! It is written by the mDNS browser (or pinned once from configuration).

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::{pin_mut, StreamExt};
use mdns::RecordKind;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mdns error: {0}")]
    Mdns(String),
}

pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressRank {
    Ipv6,
    Ipv4,
    Loopback,
}

impl AddressRank {
    fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) if v4.is_loopback() => AddressRank::Loopback,
            IpAddr::V4(_) => AddressRank::Ipv4,
            IpAddr::V6(_) => AddressRank::Ipv6,
        }
    }
}

#[derive(Debug, Default)]
struct LocatorState {
    url: Option<Url>,
    rank: Option<AddressRank>,
    pinned: bool,
}

#[derive(Clone, Default)]
pub struct BackendLocator {
    state: Arc<RwLock<LocatorState>>,
}

impl fmt::Debug for BackendLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendLocator")
            .field("current", &self.current().map(String::from))
            .finish()
    }
}

impl BackendLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A locator fixed to `url`; later mDNS offers are ignored.
    pub fn pinned(url: Url) -> Self {
        let locator = Self::new();
        if let Ok(mut state) = locator.state.write() {
            state.url = Some(url);
            state.pinned = true;
        }
        locator
    }

    pub fn current(&self) -> Option<Url> {
        self.state.read().ok().and_then(|state| state.url.clone())
    }

    /// Considers a resolved backend address. IPv4 loopback always wins, any
    /// IPv4 address replaces an IPv6 one, and nothing else replaces a known
    /// address. Returns whether the address was taken.
    pub fn offer(&self, addr: SocketAddr) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.pinned {
            return false;
        }
        let rank = AddressRank::of(&addr.ip());
        let take = match state.rank {
            None => true,
            Some(AddressRank::Ipv6) => rank != AddressRank::Ipv6,
            Some(_) => rank == AddressRank::Loopback,
        };
        if !take {
            debug!(
                candidate = %addr,
                current = ?state.url.as_ref().map(Url::as_str),
                "ignoring backend candidate"
            );
            return false;
        }
        let Some(url) = base_url(addr) else {
            warn!(candidate = %addr, "backend address does not form a url");
            return false;
        };
        if state.url.as_ref() != Some(&url) {
            info!(url = %url, "backend located");
        }
        state.url = Some(url);
        state.rank = Some(rank);
        true
    }
}

fn base_url(addr: SocketAddr) -> Option<Url> {
    // SocketAddr's Display brackets IPv6 hosts.
    Url::parse(&format!("http://{addr}")).ok()
}

/// `{base}/stream/{channel}` without doubling the slash Url keeps on bare hosts.
pub fn backend_stream_url(base: &Url, channel: &str) -> String {
    format!("{}/stream/{}", base.as_str().trim_end_matches('/'), channel)
}

/// Browses for the backend's mDNS service and feeds answers to a locator.
#[derive(Debug, Clone)]
pub struct MdnsBrowser {
    locator: BackendLocator,
    service_type: String,
    instance: String,
    query_interval: Duration,
}

impl MdnsBrowser {
    pub fn new(
        locator: BackendLocator,
        service_type: impl Into<String>,
        instance: impl Into<String>,
        query_interval: Duration,
    ) -> Self {
        Self {
            locator,
            service_type: service_type.into(),
            instance: instance.into(),
            query_interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> DiscoveryResult<()> {
        let stream = mdns::discover::all(&self.service_type, self.query_interval)
            .map_err(|err| DiscoveryError::Mdns(err.to_string()))?
            .listen();
        pin_mut!(stream);
        info!(service = %self.service_type, instance = %self.instance, "browsing for backend");

        loop {
            let response = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = stream.next() => match next {
                    Some(response) => response,
                    None => break,
                },
            };
            match response {
                Ok(response) => {
                    for addr in self.instance_addresses(&response) {
                        self.locator.offer(addr);
                    }
                }
                Err(err) => debug!(error = %err, "mdns response error"),
            }
        }
        Ok(())
    }

    fn instance_addresses(&self, response: &mdns::Response) -> Vec<SocketAddr> {
        let prefix = format!("{}.", self.instance);
        let port = response.records().find_map(|record| match &record.kind {
            RecordKind::SRV { port, .. } if record.name.starts_with(&prefix) => Some(*port),
            _ => None,
        });
        let Some(port) = port else {
            return Vec::new();
        };
        response
            .records()
            .filter_map(|record| match &record.kind {
                RecordKind::A(v4) => Some(SocketAddr::new(IpAddr::V4(*v4), port)),
                RecordKind::AAAA(v6) => Some(SocketAddr::new(IpAddr::V6(*v6), port)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn empty_locator_has_no_backend() {
        assert!(BackendLocator::new().current().is_none());
    }

    #[test]
    fn ipv4_replaces_ipv6_and_loopback_always_wins() {
        let locator = BackendLocator::new();
        assert!(locator.offer(addr("[fe80::1]:8080")));
        assert_eq!(locator.current().unwrap().as_str(), "http://[fe80::1]:8080/");

        assert!(!locator.offer(addr("[fe80::2]:8080")));
        assert!(locator.offer(addr("192.168.1.20:8080")));
        assert!(!locator.offer(addr("192.168.1.21:8080")));
        assert!(!locator.offer(addr("[fe80::3]:8080")));
        assert!(locator.offer(addr("127.0.0.1:8080")));
        assert!(!locator.offer(addr("192.168.1.22:8080")));
        assert_eq!(locator.current().unwrap().as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn pinned_locator_ignores_offers() {
        let locator = BackendLocator::pinned(Url::parse("http://tuner:9000").unwrap());
        assert!(!locator.offer(addr("127.0.0.1:8080")));
        assert_eq!(
            backend_stream_url(&locator.current().unwrap(), "5.1"),
            "http://tuner:9000/stream/5.1"
        );
    }
}
