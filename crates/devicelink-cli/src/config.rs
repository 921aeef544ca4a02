//! Device configuration from the environment.

use anyhow::{Context, Result};
use devicelink_proto::MessageProperty;
use devicelink_session::{Credentials, DeviceConfig, SecurityContext};
use std::path::PathBuf;
use std::time::Duration;

/// API version appended to the default user name.
const API_VERSION: &str = "2021-04-12";

/// Load the device configuration.
///
/// # Environment Variables
///
/// - `DEVICELINK_HOST_NAME`: Broker host (`host`, `host:port`, `mqtts://...`)
/// - `DEVICELINK_DEVICE_ID`: Device identifier
/// - `DEVICELINK_USERNAME`: User name (default `{host}/{device}/?api-version=...`)
/// - `DEVICELINK_PASSWORD`: Password or shared access signature
/// - `DEVICELINK_CA_CERT`: CA certificate path (PEM)
/// - `DEVICELINK_CLIENT_CERT` / `DEVICELINK_CLIENT_KEY`: mTLS material (PEM)
/// - `DEVICELINK_KEEP_ALIVE_SECS`: Keep-alive interval
///
/// # Errors
///
/// Returns error if a required variable is missing or a file cannot be read.
pub fn device_config_from_env() -> Result<DeviceConfig> {
    let host_name = required("DEVICELINK_HOST_NAME")?;
    let device_id = required("DEVICELINK_DEVICE_ID")?;
    let username =
        optional("DEVICELINK_USERNAME").unwrap_or_else(|| default_username(&host_name, &device_id));
    let password = required("DEVICELINK_PASSWORD")?;

    let ca_path = PathBuf::from(required("DEVICELINK_CA_CERT")?);
    let client_cert = optional("DEVICELINK_CLIENT_CERT").map(PathBuf::from);
    let client_key = optional("DEVICELINK_CLIENT_KEY").map(PathBuf::from);
    let client_auth = match (&client_cert, &client_key) {
        (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
        (None, None) => None,
        _ => anyhow::bail!("DEVICELINK_CLIENT_CERT and DEVICELINK_CLIENT_KEY must be set together"),
    };
    let security = SecurityContext::from_pem_files(&ca_path, client_auth)
        .context("Failed to load TLS material")?;

    let mut config = DeviceConfig::new(
        host_name,
        device_id,
        Credentials::new(username, password),
        security,
    );

    if let Some(secs) = optional("DEVICELINK_KEEP_ALIVE_SECS") {
        let secs: u64 = secs
            .parse()
            .context("Invalid DEVICELINK_KEEP_ALIVE_SECS")?;
        config.keep_alive = Duration::from_secs(secs);
    }

    Ok(config)
}

/// Properties applied to every message sent from the command line.
///
/// Read from `DEVICELINK_PROPERTIES` as a JSON array of `{"name", "value"}`.
///
/// # Errors
///
/// Returns error if the variable holds invalid JSON.
pub fn default_properties_from_env() -> Result<Vec<MessageProperty>> {
    match optional("DEVICELINK_PROPERTIES") {
        Some(json) => serde_json::from_str(&json).context("Invalid DEVICELINK_PROPERTIES JSON"),
        None => Ok(Vec::new()),
    }
}

fn default_username(host_name: &str, device_id: &str) -> String {
    let host = host_name
        .split_once("://")
        .map_or(host_name, |(_, rest)| rest);
    let host = host.split(':').next().unwrap_or(host);
    format!("{host}/{device_id}/?api-version={API_VERSION}")
}

fn required(name: &str) -> Result<String> {
    optional(name).with_context(|| format!("{name} is not set"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
