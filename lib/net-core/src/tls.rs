// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{Error, Result};

/// Maximum size accepted for a PEM file loaded from a path, matching the
/// original's 8 KiB ceiling on CA/cert/key buffers (spec §6).
pub const MAX_PEM_BYTES: usize = 8 * 1024;

/// Where to load a PEM blob from. Either a path (read once at init, like
/// the original's file-backed config) or raw bytes already in memory.
#[derive(Debug, Clone)]
pub enum PemSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl PemSource {
    fn load(&self) -> Result<Vec<u8>> {
        match self {
            PemSource::Path(path) => {
                let bytes = fs::read(path).map_err(|e| Error::TlsMaterial(format!("{}: {e}", path.display())))?;
                if bytes.len() > MAX_PEM_BYTES {
                    return Err(Error::TlsMaterial(format!("{} exceeds {MAX_PEM_BYTES} bytes", path.display())));
                }
                Ok(bytes)
            }
            PemSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// TLS material accepted by the MQTT client's `authentication` configuration
/// (spec §6): CA chain and an optional client cert/key pair.
#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    pub ca: Option<PemSource>,
    pub client_cert: Option<PemSource>,
    pub client_key: Option<PemSource>,
    pub verify_hostname: bool,
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut &*pem)
        .collect::<core::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::TlsMaterial(e.to_string()))
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut &*pem)
        .map_err(|e| Error::TlsMaterial(e.to_string()))?
        .ok_or_else(|| Error::TlsMaterial("no private key found in PEM".into()))
}

/// Builds a [`rustls::ClientConfig`] from [`TlsMaterial`], parsed once at
/// init.
pub fn build_client_config(material: &TlsMaterial) -> Result<Arc<rustls::ClientConfig>> {
    let mut roots = rustls::RootCertStore::empty();
    if let Some(ca) = &material.ca {
        let pem = ca.load()?;
        for cert in parse_certs(&pem)? {
            roots.add(cert).map_err(|e| Error::TlsMaterial(e.to_string()))?;
        }
    }

    let builder = rustls::ClientConfig::builder();
    let builder_with_verifier = if material.verify_hostname {
        builder.with_root_certificates(roots)
    } else {
        let provider = builder.crypto_provider().clone();
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(crate::verify::NoHostnameVerification::new(provider)))
    };

    let config = match (&material.client_cert, &material.client_key) {
        (Some(cert_src), Some(key_src)) => {
            let cert_pem = cert_src.load()?;
            let key_pem = key_src.load()?;
            let certs = parse_certs(&cert_pem)?;
            let key = parse_private_key(&key_pem)?;
            builder_with_verifier.with_client_auth_cert(certs, key)?
        }
        _ => builder_with_verifier.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}
