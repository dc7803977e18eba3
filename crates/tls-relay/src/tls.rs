// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TLS material and event channel authentication.
//!
//! The event channel is mutually authenticated: each role presents
//! `./cert/<role>.crt` / `./cert/<role>.key` and accepts exactly one
//! peer certificate, `./cert/<peer>.crt`, by certificate pin. Pinning
//! binds the peer to the configured certificate byte-for-byte; there is
//! no chain building and no name check, and no other certificate is
//! accepted.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Directory holding the certificate material.
pub const CERT_DIR: &str = "./cert";

/// A local TLS identity: certificate chain plus private key.
#[derive(Debug)]
pub struct TlsIdentity {
    /// Certificate chain, end entity first.
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// Private key for the end-entity certificate.
    pub key: PrivateKeyDer<'static>,
}

/// Loads a PEM identity for `role` from [`CERT_DIR`]
/// (`<role>.crt` / `<role>.key`).
///
/// # Errors
///
/// Returns an error if either file is missing, unreadable, or empty.
pub fn load_role_identity(role: &str) -> Result<TlsIdentity, TlsError> {
    let dir = Path::new(CERT_DIR);
    load_identity(
        dir.join(format!("{role}.crt")),
        dir.join(format!("{role}.key")),
    )
}

/// Loads the pinned peer certificate for `peer` from [`CERT_DIR`]
/// (`<peer>.crt`).
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or holds no
/// certificate.
pub fn load_role_peer(peer: &str) -> Result<CertificateDer<'static>, TlsError> {
    load_pinned_peer(Path::new(CERT_DIR).join(format!("{peer}.crt")))
}

/// Loads a certificate chain and private key from PEM files.
///
/// # Errors
///
/// Returns an error if either file is missing, unreadable, or empty.
pub fn load_identity(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<TlsIdentity, TlsError> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let cert_chain = load_certs(cert_path)?;

    let mut reader = open(key_path)?;
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: key_path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: key_path.display().to_string(),
        })?;

    Ok(TlsIdentity { cert_chain, key })
}

/// Loads the peer certificate to pin from a PEM file.
///
/// Only the first certificate in the file is pinned.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or holds no
/// certificate.
pub fn load_pinned_peer(path: impl AsRef<Path>) -> Result<CertificateDer<'static>, TlsError> {
    let path = path.as_ref();
    let mut certs = load_certs(path)?;
    Ok(certs.remove(0))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate {
            path: path.display().to_string(),
        });
    }
    Ok(certs)
}

fn open(path: &Path) -> Result<std::io::BufReader<std::fs::File>, TlsError> {
    let file = std::fs::File::open(path).map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(std::io::BufReader::new(file))
}

/// Builds the server-side TLS configuration for the event listener.
///
/// Client authentication is mandatory and bound to the pinned peer
/// certificate.
///
/// # Errors
///
/// Returns an error if the identity is rejected by rustls.
pub fn server_config(
    identity: TlsIdentity,
    pinned_peer: CertificateDer<'static>,
) -> Result<rustls::ServerConfig, TlsError> {
    let verifier = Arc::new(PinnedClientVerifier::new(pinned_peer));
    let config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(identity.cert_chain, identity.key)?;
    Ok(config)
}

/// Builds the client-side TLS configuration for dialing the event
/// channel.
///
/// The server is authenticated by certificate pin; our identity is
/// presented for client authentication.
///
/// # Errors
///
/// Returns an error if the identity is rejected by rustls.
pub fn client_config(
    identity: TlsIdentity,
    pinned_peer: CertificateDer<'static>,
) -> Result<rustls::ClientConfig, TlsError> {
    let verifier = Arc::new(PinnedServerVerifier::new(pinned_peer));
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(identity.cert_chain, identity.key)?;
    Ok(config)
}

/// Extracts the host part of a `host:port` address for TLS server name
/// indication.
///
/// With certificate pinning the name carries no trust, but rustls
/// still requires one for the handshake.
///
/// # Errors
///
/// Returns an error if the host is not a valid DNS name or IP address.
pub fn server_name(addr: &str) -> Result<ServerName<'static>, TlsError> {
    if let Ok(socket_addr) = addr.parse::<std::net::SocketAddr>() {
        return Ok(ServerName::IpAddress(socket_addr.ip().into()));
    }
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    ServerName::try_from(host.to_owned()).map_err(|_| TlsError::InvalidServerName {
        addr: addr.to_owned(),
    })
}

/// Accepts exactly one server certificate, by byte equality.
#[derive(Debug)]
struct PinnedServerVerifier {
    pinned: CertificateDer<'static>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl PinnedServerVerifier {
    fn new(pinned: CertificateDer<'static>) -> Self {
        Self {
            pinned,
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.pinned.as_ref() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Accepts exactly one client certificate, by byte equality.
#[derive(Debug)]
struct PinnedClientVerifier {
    pinned: CertificateDer<'static>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl PinnedClientVerifier {
    fn new(pinned: CertificateDer<'static>) -> Self {
        Self {
            pinned,
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ClientCertVerifier for PinnedClientVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.pinned.as_ref() {
            Ok(ClientCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// TLS setup errors.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A PEM file could not be read or parsed.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No certificate found in a PEM file.
    #[error("no certificate found in {path}")]
    NoCertificate {
        /// Path that was searched.
        path: String,
    },

    /// No private key found in a PEM file.
    #[error("no private key found in {path}")]
    NoPrivateKey {
        /// Path that was searched.
        path: String,
    },

    /// The event address yields no usable TLS server name.
    #[error("cannot derive a TLS server name from {addr}")]
    InvalidServerName {
        /// The offending address.
        addr: String,
    },

    /// rustls rejected the configuration.
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated_identity(name: &str) -> (TlsIdentity, CertificateDer<'static>) {
        let cert = rcgen::generate_simple_self_signed(vec![name.to_owned()])
            .expect("generate certificate");
        let cert_der = CertificateDer::from(cert.cert);
        let key_der = PrivateKeyDer::try_from(cert.key_pair.serialize_der()).expect("key der");
        (
            TlsIdentity {
                cert_chain: vec![cert_der.clone()],
                key: key_der,
            },
            cert_der,
        )
    }

    #[test]
    fn pinned_server_verifier_accepts_only_the_pin() {
        let (_identity, pinned) = generated_identity("server.test");
        let (_other_identity, other) = generated_identity("intruder.test");
        let verifier = PinnedServerVerifier::new(pinned.clone());

        let name = ServerName::try_from("server.test").expect("name");
        let now = UnixTime::now();

        assert!(verifier
            .verify_server_cert(&pinned, &[], &name, &[], now)
            .is_ok());
        assert!(verifier
            .verify_server_cert(&other, &[], &name, &[], now)
            .is_err());
    }

    #[test]
    fn pinned_client_verifier_accepts_only_the_pin() {
        let (_identity, pinned) = generated_identity("client.test");
        let (_other_identity, other) = generated_identity("intruder.test");
        let verifier = PinnedClientVerifier::new(pinned.clone());

        let now = UnixTime::now();
        assert!(verifier.verify_client_cert(&pinned, &[], now).is_ok());
        assert!(verifier.verify_client_cert(&other, &[], now).is_err());
    }

    #[test]
    fn configs_build_from_generated_material() {
        let (server_identity, server_cert) = generated_identity("server.test");
        let (client_identity, client_cert) = generated_identity("client.test");

        server_config(server_identity, client_cert).expect("server config");
        client_config(client_identity, server_cert).expect("client config");
    }

    #[test]
    fn server_name_extraction() {
        assert!(server_name("relay.example.com:8443").is_ok());
        assert!(server_name("127.0.0.1:8443").is_ok());
        assert!(server_name("[::1]:8443").is_ok());
        assert!(server_name("relay.example.com").is_ok());
    }

    #[test]
    fn missing_files_are_errors() {
        assert!(matches!(
            load_identity("/nonexistent/a.crt", "/nonexistent/a.key"),
            Err(TlsError::Read { .. })
        ));
        assert!(matches!(
            load_pinned_peer("/nonexistent/peer.crt"),
            Err(TlsError::Read { .. })
        ));
    }
}
