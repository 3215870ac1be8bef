/*
 * tls.rs
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

//! Server-side TLS setup: a bundled self-signed certificate for callers who
//! don't care which identity the mock server presents, plus loading of a
//! caller-supplied PEM pair.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;

use super::error::ServerError;

/// Self-signed leaf certificate, CN `uhttpmock.invalid`, valid for a century.
/// Good enough for clients that pin nothing and only need a TLS handshake to
/// succeed; not suitable for anything checking hostname or chain trust.
const DEFAULT_CERT_PEM: &str = include_str!("default_cert.pem");
const DEFAULT_KEY_PEM: &str = include_str!("default_key.pem");

/// One certificate, in PEM form, paired with its PEM private key.
#[derive(Debug, Clone)]
pub struct TlsCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

impl TlsCertificate {
    /// The bundled default identity, mirroring
    /// `uhm_server_set_default_tls_certificate()`.
    pub fn default_certificate() -> Self {
        Self {
            cert_pem: DEFAULT_CERT_PEM.to_string(),
            key_pem: DEFAULT_KEY_PEM.to_string(),
        }
    }

    pub fn from_pem(cert_pem: impl Into<String>, key_pem: impl Into<String>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        }
    }

    /// Parse into a `rustls::ServerConfig` ready to hand to a TLS acceptor.
    pub(super) fn build_server_config(&self) -> Result<Arc<ServerConfig>, ServerError> {
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut self.cert_pem.as_bytes())
            .collect::<Result<_, _>>()
            .map_err(|e| ServerError::InvalidState(format!("invalid TLS certificate PEM: {}", e)))?;
        if certs.is_empty() {
            return Err(ServerError::InvalidState("no certificate found in PEM".to_string()));
        }
        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut self.key_pem.as_bytes())
            .map_err(|e| ServerError::InvalidState(format!("invalid TLS private key PEM: {}", e)))?
            .ok_or_else(|| ServerError::InvalidState("no private key found in PEM".to_string()))?;

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ServerError::InvalidState(format!("invalid TLS certificate/key pair: {}", e)))?;
        Ok(Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_certificate_parses_into_a_server_config() {
        let cert = TlsCertificate::default_certificate();
        cert.build_server_config().expect("bundled PEM pair must parse");
    }
}
