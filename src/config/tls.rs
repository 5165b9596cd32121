use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tonic::transport::Certificate;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Identity;

use crate::Error;
use crate::Result;

/// Client side TLS towards the allocation store
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoreTlsConfig {
    /// Certificate Authority root certificate in PEM format
    pub ca_path: PathBuf,

    /// Client certificate chain for mTLS, requires `key_path`
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Client private key for mTLS, requires `cert_path`
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Overrides the server name checked against the certificate
    #[serde(default)]
    pub domain_name: Option<String>,
}

impl StoreTlsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ca_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("store.tls.ca_path cannot be empty".into()));
        }
        match (&self.cert_path, &self.key_path) {
            (Some(_), None) | (None, Some(_)) => Err(Error::InvalidConfig(
                "store.tls.cert_path and store.tls.key_path must be set together".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Reads the PEM material into a tonic client TLS config.
    ///
    /// # Errors
    /// Returns an io error when a certificate or key file cannot be read.
    pub fn client_tls_config(&self) -> Result<ClientTlsConfig> {
        let ca = std::fs::read_to_string(&self.ca_path)?;
        let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));

        if let (Some(cert_path), Some(key_path)) = (&self.cert_path, &self.key_path) {
            let cert = std::fs::read_to_string(cert_path)?;
            let key = std::fs::read_to_string(key_path)?;
            tls = tls.identity(Identity::from_pem(cert, key));
        }
        if let Some(domain) = &self.domain_name {
            tls = tls.domain_name(domain.clone());
        }
        Ok(tls)
    }
}
