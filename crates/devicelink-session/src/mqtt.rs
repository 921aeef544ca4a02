//! `rumqttc` implementation of [`Transport`].
//!
//! The client and its event loop live on a private tokio runtime; every
//! [`Transport`] call blocks on that runtime. Do not drive an `MqttTransport`
//! from inside another tokio runtime.

use crate::config::DeviceConfig;
use crate::error::SessionError;
use crate::transport::{Transport, TransportError};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    SubscribeReasonCode, TlsConfiguration,
};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

/// Default MQTT-over-TLS port.
pub const DEFAULT_PORT: u16 = 8883;

/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 100;

/// Capacity of the acknowledgement feed read by `connect` and `subscribe`.
/// Events arriving while it is full are dropped.
const EVENT_CAPACITY: usize = 16;

/// Pause before polling again after an event loop error.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Broker acknowledgements and failures forwarded from the event loop.
#[derive(Debug)]
enum LinkEvent {
    ConnAck(ConnectReturnCode),
    SubAck(Vec<SubscribeReasonCode>),
    Failed(String),
}

/// A live connection: client handle, acknowledgement feed, and event loop task.
struct Link {
    client: AsyncClient,
    events: mpsc::Receiver<LinkEvent>,
    task: JoinHandle<()>,
}

/// MQTT transport over TLS.
pub struct MqttTransport {
    host: String,
    port: u16,
    config: DeviceConfig,
    runtime: Runtime,
    link: Option<Link>,
}

impl MqttTransport {
    /// Create a transport for the configured device. No connection is made.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the configuration is
    /// incomplete, the broker address is invalid, or the runtime cannot start.
    pub fn new(config: &DeviceConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let (host, port) = parse_broker_address(&config.host_name)
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("devicelink-mqtt")
            .enable_all()
            .build()
            .map_err(|e| SessionError::Configuration(format!("failed to start runtime: {e}")))?;

        Ok(Self {
            host,
            port,
            config: config.clone(),
            runtime,
            link: None,
        })
    }

    /// Whether a connection has been established and not yet reset.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.config.device_id, &self.host, self.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(false);
        options.set_credentials(
            &self.config.credentials.username,
            &self.config.credentials.password,
        );
        options.set_transport(rumqttc::Transport::tls_with_config(
            TlsConfiguration::Simple {
                ca: self.config.security.ca_cert.clone(),
                alpn: None,
                client_auth: self.config.security.client_auth.clone(),
            },
        ));
        options
    }
}

impl Transport for MqttTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if let Some(stale) = self.link.take() {
            tracing::debug!("Dropping previous connection before reconnecting");
            stale.task.abort();
        }

        tracing::info!(host = %self.host, port = self.port, "Connecting to MQTT broker");

        let (client, eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_CAPACITY);
        let (tx, events) = mpsc::channel(EVENT_CAPACITY);
        let task = self.runtime.spawn(drive_event_loop(eventloop, tx));
        let mut link = Link {
            client,
            events,
            task,
        };

        let outcome: Result<(), TransportError> = self.runtime.block_on(async {
            timeout(self.config.connect_timeout, wait_for_connack(&mut link.events))
                .await
                .map_err(|_| TransportError::Timeout("CONNACK"))?
        });

        match outcome {
            Ok(()) => {
                self.link = Some(link);
                Ok(())
            }
            Err(err) => {
                link.task.abort();
                Err(err)
            }
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        let qos = self.config.qos;
        let wait = self.config.connect_timeout;

        // Failures and acks left over from earlier reconnects.
        while link.events.try_recv().is_ok() {}

        self.runtime.block_on(async {
            link.client
                .subscribe(topic, qos)
                .await
                .map_err(|e| TransportError::Subscribe(e.to_string()))?;

            timeout(wait, wait_for_suback(&mut link.events))
                .await
                .map_err(|_| TransportError::Timeout("SUBACK"))?
        })
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;

        self.runtime
            .block_on(
                link.client
                    .publish(topic, self.config.qos, false, payload.to_vec()),
            )
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(link) = self.link.as_mut() else {
            tracing::debug!("Disconnect requested without a connection");
            return Ok(());
        };
        let wait = self.config.connect_timeout;

        self.runtime.block_on(async {
            link.client
                .disconnect()
                .await
                .map_err(|e| TransportError::Disconnect(e.to_string()))?;

            if timeout(wait, &mut link.task).await.is_err() {
                tracing::warn!("Event loop did not flush DISCONNECT in time");
            }
            Ok::<(), TransportError>(())
        })
    }

    fn reset(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
        tracing::debug!("MQTT transport reset");
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, events: mpsc::Sender<LinkEvent>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "Connected to MQTT broker");
                forward(&events, LinkEvent::ConnAck(ack.code));
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                tracing::info!(pkid = ack.pkid, "Subscription acknowledged");
                forward(&events, LinkEvent::SubAck(ack.return_codes));
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    payload_len = publish.payload.len(),
                    "Received devicebound message"
                );
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::info!("Disconnected from MQTT broker");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT error");
                forward(&events, LinkEvent::Failed(e.to_string()));
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Hand an event to whoever waits on the link without ever blocking the loop.
fn forward(events: &mpsc::Sender<LinkEvent>, event: LinkEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(dropped)) => {
            tracing::debug!(event = ?dropped, "Acknowledgement feed full, dropping event");
        }
        // Nobody is waiting once the transport has been reset.
        Err(TrySendError::Closed(_)) => {}
    }
}

async fn wait_for_connack(events: &mut mpsc::Receiver<LinkEvent>) -> Result<(), TransportError> {
    loop {
        match events.recv().await {
            Some(LinkEvent::ConnAck(ConnectReturnCode::Success)) => return Ok(()),
            Some(LinkEvent::ConnAck(code)) => {
                return Err(TransportError::Connect(format!("broker refused: {code:?}")));
            }
            Some(LinkEvent::Failed(reason)) => return Err(TransportError::Connect(reason)),
            Some(LinkEvent::SubAck(_)) => {}
            None => return Err(TransportError::Connect("event loop stopped".to_string())),
        }
    }
}

async fn wait_for_suback(events: &mut mpsc::Receiver<LinkEvent>) -> Result<(), TransportError> {
    loop {
        match events.recv().await {
            Some(LinkEvent::SubAck(codes)) => {
                if codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    return Err(TransportError::Subscribe(
                        "broker refused subscription".to_string(),
                    ));
                }
                return Ok(());
            }
            Some(LinkEvent::Failed(reason)) => return Err(TransportError::Subscribe(reason)),
            Some(LinkEvent::ConnAck(_)) => {}
            None => return Err(TransportError::Subscribe("event loop stopped".to_string())),
        }
    }
}

/// Parse a broker address into host and port.
///
/// Accepts `host`, `host:port`, or an `mqtts://`, `ssl://` or `tls://` URL.
/// Plaintext `tcp://` and `mqtt://` are refused: the connection always uses
/// the configured TLS material. The port defaults to [`DEFAULT_PORT`].
fn parse_broker_address(input: &str) -> Result<(String, u16), TransportError> {
    if input.contains("://") {
        let url = Url::parse(input)
            .map_err(|e| TransportError::InvalidConfig(format!("{input}: {e}")))?;

        match url.scheme() {
            "mqtts" | "ssl" | "tls" => {}
            scheme => {
                return Err(TransportError::InvalidConfig(format!(
                    "{input}: unsupported scheme '{scheme}'"
                )));
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidConfig(format!("{input}: missing host")))?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        return Ok((host.to_string(), port));
    }

    let mut parts = input.split(':');
    let host = parts
        .next()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TransportError::InvalidConfig(format!("{input}: missing host")))?;
    let port = match parts.next() {
        None => DEFAULT_PORT,
        Some(port) => port.parse().map_err(|_| {
            TransportError::InvalidConfig(format!("{input}: invalid port '{port}'"))
        })?,
    };
    if parts.next().is_some() {
        return Err(TransportError::InvalidConfig(format!(
            "{input}: too many ':' separators"
        )));
    }

    Ok((host.to_string(), port))
}
