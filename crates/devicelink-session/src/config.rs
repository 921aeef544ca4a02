//! Device connection configuration.

use crate::error::SessionError;
use rumqttc::QoS;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Broker credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// MQTT user name
    pub username: String,
    /// MQTT password (typically a shared access signature)
    pub password: String,
}

impl Credentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TLS material for the broker connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    /// Trusted CA certificates (PEM)
    pub ca_cert: Vec<u8>,
    /// Client certificate and private key (PEM) for mutual TLS
    pub client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl SecurityContext {
    /// Create a context trusting the given CA certificates.
    #[must_use]
    pub fn new(ca_cert: impl Into<Vec<u8>>) -> Self {
        Self {
            ca_cert: ca_cert.into(),
            client_auth: None,
        }
    }

    /// Attach a client certificate and key for mutual TLS.
    #[must_use]
    pub fn with_client_auth(mut self, cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        self.client_auth = Some((cert.into(), key.into()));
        self
    }

    /// Load PEM material from disk.
    ///
    /// # Errors
    ///
    /// Returns error if any of the files cannot be read.
    pub fn from_pem_files(
        ca_path: &Path,
        client_auth: Option<(&Path, &Path)>,
    ) -> Result<Self, SessionError> {
        let ca_cert = read_pem(ca_path, "CA certificate")?;
        let client_auth = match client_auth {
            Some((cert_path, key_path)) => Some((
                read_pem(cert_path, "client certificate")?,
                read_pem(key_path, "client key")?,
            )),
            None => None,
        };

        Ok(Self {
            ca_cert,
            client_auth,
        })
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("ca_cert_len", &self.ca_cert.len())
            .field("client_auth", &self.client_auth.is_some())
            .finish()
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, SessionError> {
    let pem = fs::read(path).map_err(|e| {
        SessionError::Configuration(format!("failed to read {what} {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), len = pem.len(), what, "Loaded PEM material");
    Ok(pem)
}

/// Everything needed to open a messaging session for one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Broker address (`host`, `host:port`, or `mqtts://host:port`)
    pub host_name: String,
    /// Device identifier, also used as the MQTT client id
    pub device_id: String,
    /// Broker credentials
    pub credentials: Credentials,
    /// TLS material
    pub security: SecurityContext,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// How long `connect` and `subscribe` wait for the broker
    pub connect_timeout: Duration,
    /// Quality of service for subscriptions and publishes
    pub qos: QoS,
}

impl DeviceConfig {
    /// Create a configuration with default timings and `AtLeastOnce` delivery.
    #[must_use]
    pub fn new(
        host_name: impl Into<String>,
        device_id: impl Into<String>,
        credentials: Credentials,
        security: SecurityContext,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            device_id: device_id.into(),
            credentials,
            security,
            keep_alive: Duration::from_secs(230),
            connect_timeout: Duration::from_secs(30),
            qos: QoS::AtLeastOnce,
        }
    }

    /// Check that no required field is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] naming the first empty field.
    pub fn validate(&self) -> Result<(), SessionError> {
        let required = [
            ("host name", self.host_name.trim()),
            ("device id", self.device_id.trim()),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(SessionError::Configuration(format!(
                    "{field} must not be empty"
                )));
            }
        }

        if self.security.ca_cert.is_empty() {
            return Err(SessionError::Configuration(
                "security context has no CA certificate".to_string(),
            ));
        }
        if let Some((cert, key)) = &self.security.client_auth {
            if cert.is_empty() || key.is_empty() {
                return Err(SessionError::Configuration(
                    "client certificate and key must both be present".to_string(),
                ));
            }
        }

        Ok(())
    }
}
