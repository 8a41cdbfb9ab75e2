//! TLS configuration for both ends of the mutual-TLS link.
//!
//! The relay requires a client certificate signed by `--client-ca`; the
//! identity of a client is derived from that certificate.  Clients present
//! their own certificate and verify the relay against `--server-ca` (or the
//! bundled web PKI roots).
//!
//! Private keys may be PKCS#8, PKCS#1 or SEC1 PEM.  An `ENCRYPTED PRIVATE
//! KEY` (PBES2 PKCS#8) is decrypted with `--cert-key-pass`.
//!
//! The `ring` provider is selected explicitly for every config so that no
//! process-wide default provider has to be installed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkcs8::EncryptedPrivateKeyInfo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime,
};
use thiserror::Error;
use tracing::warn;

use crate::config::TlsFiles;

const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const ALPN_HTTP1: &[u8] = b"http/1.1";

/// Error type for loading TLS material and building configs.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("unable to read {what} {path}: {source}")]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse {what} {path}: {message}")]
    Pem {
        what: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("no certificate found in {0}")]
    NoCertificates(PathBuf),

    #[error("private key {0} is encrypted; a passphrase is required")]
    PassphraseRequired(PathBuf),

    #[error("unable to decrypt private key {path}: {message}")]
    Decrypt { path: PathBuf, message: String },

    #[error("TLS error: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("unable to build client certificate verifier: {0}")]
    ClientVerifier(#[from] rustls::server::VerifierBuilderError),
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(crypto::ring::default_provider())
}

fn read_file(what: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })
}

// ── PEM loading ───────────────────────────────────────────────────────────────

/// Loads every certificate in a PEM file.
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem = read_file("certificate", path)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Pem {
            what: "certificate",
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Loads a private key, decrypting it with `passphrase` if it is encrypted.
pub fn load_private_key(
    path: &Path,
    passphrase: Option<&str>,
) -> Result<PrivateKeyDer<'static>, TlsError> {
    let pem = read_file("private key", path)?;
    let text = String::from_utf8_lossy(&pem);

    if text.contains(&format!("-----BEGIN {ENCRYPTED_KEY_LABEL}-----")) {
        let passphrase =
            passphrase.ok_or_else(|| TlsError::PassphraseRequired(path.to_path_buf()))?;
        return decrypt_private_key(path, &text, passphrase);
    }

    if passphrase.is_some() {
        warn!(path = %path.display(), "key passphrase given but the key is not encrypted");
    }
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| TlsError::Pem {
        what: "private key",
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn decrypt_private_key(
    path: &Path,
    pem: &str,
    passphrase: &str,
) -> Result<PrivateKeyDer<'static>, TlsError> {
    let decrypt_error = |message: String| TlsError::Decrypt {
        path: path.to_path_buf(),
        message,
    };

    let (label, document) =
        pkcs8::Document::from_pem(pem.trim()).map_err(|e| decrypt_error(e.to_string()))?;
    if label != ENCRYPTED_KEY_LABEL {
        return Err(decrypt_error(format!("unexpected PEM label '{label}'")));
    }
    let encrypted = EncryptedPrivateKeyInfo::try_from(document.as_bytes())
        .map_err(|e| decrypt_error(e.to_string()))?;
    let decrypted = encrypted
        .decrypt(passphrase)
        .map_err(|e| decrypt_error(format!("{e} (wrong passphrase?)")))?;

    Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        decrypted.as_bytes().to_vec(),
    )))
}

/// Builds a root store from every certificate in a PEM bundle.
pub fn load_root_store(path: &Path) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certificates(path)? {
        roots.add(cert)?;
    }
    Ok(roots)
}

// ── Server ────────────────────────────────────────────────────────────────────

/// Relay TLS config: presents `identity`, requires a client certificate
/// issued by `client_ca`.
pub fn server_config(identity: &TlsFiles, client_ca: &Path) -> Result<ServerConfig, TlsError> {
    let provider = provider();
    let certs = load_certificates(&identity.cert)?;
    let key = load_private_key(&identity.cert_key, identity.cert_key_pass.as_deref())?;
    let client_roots = load_root_store(client_ca)?;

    let verifier =
        WebPkiClientVerifier::builder_with_provider(Arc::new(client_roots), Arc::clone(&provider))
            .build()?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];
    Ok(config)
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Client TLS config: presents `identity` and verifies the relay against
/// `server_ca`, or the web PKI roots when `None`.
///
/// With `insecure_skip_verify` the relay certificate is not checked at all
/// (handshake signatures still are).
pub fn client_config(
    identity: &TlsFiles,
    server_ca: Option<&Path>,
    insecure_skip_verify: bool,
) -> Result<ClientConfig, TlsError> {
    let provider = provider();
    let certs = load_certificates(&identity.cert)?;
    let key = load_private_key(&identity.cert_key, identity.cert_key_pass.as_deref())?;

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;
    let builder = if insecure_skip_verify {
        warn!("relay certificate verification is disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
    } else {
        let roots = match server_ca {
            Some(path) => load_root_store(path)?,
            None => RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            },
        };
        builder.with_root_certificates(roots)
    };

    let mut config = builder.with_client_auth_cert(certs, key)?;
    config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];
    Ok(config)
}

/// Accepts any relay certificate but still verifies handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
