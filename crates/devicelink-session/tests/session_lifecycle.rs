use devicelink_proto::Message;
use devicelink_session::{
    Credentials, DeviceConfig, MessagingSession, SecurityContext, SessionError, SessionState,
    Transport, TransportError,
};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Connect,
    Subscribe(String),
    Publish(String, Vec<u8>),
    Disconnect,
    Reset,
}

/// Records every call and fails the operations it is told to fail.
#[derive(Default)]
struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    fail_connect: Option<TransportError>,
    fail_subscribe: Option<TransportError>,
    fail_publish: Option<TransportError>,
    fail_disconnect: Option<TransportError>,
}

impl ScriptedTransport {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn published_topics(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish(topic, _) => Some(topic),
                _ => None,
            })
            .collect()
    }
}

fn outcome(failure: Option<&TransportError>) -> Result<(), TransportError> {
    failure.map_or(Ok(()), |err| Err(err.clone()))
}

impl Transport for ScriptedTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.record(Call::Connect);
        outcome(self.fail_connect.as_ref())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.record(Call::Subscribe(topic.to_string()));
        outcome(self.fail_subscribe.as_ref())
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.record(Call::Publish(topic.to_string(), payload.to_vec()));
        outcome(self.fail_publish.as_ref())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        outcome(self.fail_disconnect.as_ref())
    }

    fn reset(&mut self) {
        self.record(Call::Reset);
    }
}

const PUBLISH_TOPIC: &str = "devices/dev1/messages/events/";

fn config() -> DeviceConfig {
    DeviceConfig::new(
        "hub.example.net",
        "dev1",
        Credentials::new("hub.example.net/dev1/?api-version=2021-04-12", "sas"),
        SecurityContext::new(b"-----BEGIN CERTIFICATE-----".to_vec()),
    )
}

fn started(transport: ScriptedTransport) -> MessagingSession<ScriptedTransport> {
    let mut session = MessagingSession::new(&config(), transport).unwrap();
    session.start().unwrap();
    session
}

#[test]
fn construction_derives_topics_without_touching_transport() {
    let session = MessagingSession::new(&config(), ScriptedTransport::default()).unwrap();

    assert_eq!(session.topics().publish_topic(), PUBLISH_TOPIC);
    assert_eq!(
        session.topics().subscribe_topic(),
        "devices/dev1/messages/devicebound/#"
    );
    assert_eq!(
        session.topics().receive_prefix(),
        "devices/dev1/messages/devicebound/"
    );
    assert!(session.transport().calls().is_empty());
    assert_eq!(session.state(), SessionState::NotStarted);
}

#[test]
fn construction_rejects_empty_identity_and_credentials() {
    let mut no_id = config();
    no_id.device_id.clear();
    let mut no_password = config();
    no_password.credentials.password.clear();
    let mut no_context = config();
    no_context.security = SecurityContext::default();

    for bad in [no_id, no_password, no_context] {
        let result = MessagingSession::new(&bad, ScriptedTransport::default());
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }
}

#[test]
fn start_connects_then_subscribes() {
    let session = started(ScriptedTransport::default());

    assert_eq!(
        session.transport().calls(),
        vec![
            Call::Connect,
            Call::Subscribe("devices/dev1/messages/devicebound/#".to_string()),
        ]
    );
    assert_eq!(session.state(), SessionState::Started);
}

#[test]
fn start_stops_after_connect_failure() {
    let failure = TransportError::Connect("refused".to_string());
    let transport = ScriptedTransport {
        fail_connect: Some(failure.clone()),
        ..ScriptedTransport::default()
    };
    let mut session = MessagingSession::new(&config(), transport).unwrap();

    assert_eq!(session.start(), Err(SessionError::Io(failure)));
    assert_eq!(session.transport().calls(), vec![Call::Connect]);
    assert_eq!(session.state(), SessionState::NotStarted);
}

#[test]
fn subscribe_failure_propagates_without_retry() {
    let failure = TransportError::Subscribe("not authorized".to_string());
    let transport = ScriptedTransport {
        fail_subscribe: Some(failure.clone()),
        ..ScriptedTransport::default()
    };
    let mut session = MessagingSession::new(&config(), transport).unwrap();

    assert_eq!(session.start(), Err(SessionError::Io(failure)));
    assert_eq!(
        session.transport().calls(),
        vec![
            Call::Connect,
            Call::Subscribe("devices/dev1/messages/devicebound/#".to_string()),
        ]
    );
    assert_ne!(session.state(), SessionState::Started);
}

#[test]
fn send_without_metadata_uses_base_topic() {
    let session = started(ScriptedTransport::default());

    session.send(&Message::new("21.5")).unwrap();

    let calls = session.transport().calls();
    assert_eq!(
        calls.last(),
        Some(&Call::Publish(PUBLISH_TOPIC.to_string(), b"21.5".to_vec()))
    );
}

#[test]
fn send_encodes_properties_and_message_id() {
    let session = started(ScriptedTransport::default());

    session
        .send(&Message::new("x").with_property("a", "1").with_property("b", "2"))
        .unwrap();
    session.send(&Message::new("x").with_message_id("m1")).unwrap();
    session
        .send(&Message::new("x").with_property("a", "1").with_message_id("m1"))
        .unwrap();

    assert_eq!(
        session.transport().published_topics(),
        vec![
            format!("{PUBLISH_TOPIC}a=1&b=2"),
            format!("{PUBLISH_TOPIC}$.mid=m1"),
            format!("{PUBLISH_TOPIC}a=1&$.mid=m1"),
        ]
    );
}

#[test]
fn send_escapes_reserved_characters() {
    let session = started(ScriptedTransport::default());

    session
        .send(&Message::new("x").with_property("k&v", "a=b"))
        .unwrap();

    assert_eq!(
        session.transport().published_topics(),
        vec![format!("{PUBLISH_TOPIC}k%26v=a%3Db")]
    );
}

#[test]
fn send_rejects_missing_message_or_payload() {
    let session = started(ScriptedTransport::default());

    assert!(matches!(
        session.send(None),
        Err(SessionError::InvalidMessage(_))
    ));
    assert!(matches!(
        session.send(&Message::default().with_property("a", "1")),
        Err(SessionError::InvalidMessage(_))
    ));
    assert!(session.transport().published_topics().is_empty());
}

#[test]
fn send_rejects_reserved_property_name() {
    let session = started(ScriptedTransport::default());

    let result = session.send(&Message::new("x").with_property("$.mid", "spoof"));

    assert!(matches!(result, Err(SessionError::InvalidMessage(_))));
    assert!(session.transport().published_topics().is_empty());
}

#[test]
fn publish_failure_propagates_unchanged() {
    let failure = TransportError::Publish("request channel closed".to_string());
    let transport = ScriptedTransport {
        fail_publish: Some(failure.clone()),
        ..ScriptedTransport::default()
    };
    let session = started(transport);

    assert_eq!(
        session.send(&Message::new("x")),
        Err(SessionError::Io(failure))
    );
    assert_eq!(session.transport().published_topics().len(), 1);
}

#[test]
fn stop_disconnects_then_resets() {
    let mut session = started(ScriptedTransport::default());

    session.stop().unwrap();

    let calls = session.transport().calls();
    assert_eq!(&calls[2..], &[Call::Disconnect, Call::Reset]);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn stop_resets_once_and_returns_disconnect_error() {
    let failure = TransportError::Disconnect("broken pipe".to_string());
    let transport = ScriptedTransport {
        fail_disconnect: Some(failure.clone()),
        ..ScriptedTransport::default()
    };
    let mut session = started(transport);

    assert_eq!(session.stop(), Err(SessionError::Io(failure)));

    let calls = session.transport().calls();
    assert_eq!(calls.iter().filter(|c| **c == Call::Reset).count(), 1);
    assert_eq!(&calls[2..], &[Call::Disconnect, Call::Reset]);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn send_after_stop_is_rejected() {
    let mut session = started(ScriptedTransport::default());
    session.stop().unwrap();

    assert_eq!(
        session.send(&Message::new("x")),
        Err(SessionError::NotStarted(SessionState::Stopped))
    );
}

#[test]
fn restart_after_stop_reconnects() {
    let mut session = started(ScriptedTransport::default());
    session.stop().unwrap();
    session.start().unwrap();

    let calls = session.transport().calls();
    assert_eq!(calls[4], Call::Connect);
    assert_eq!(session.state(), SessionState::Started);
}

#[test]
fn concurrent_sends_share_the_session() {
    let session = started(ScriptedTransport::default());

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let session = &session;
            scope.spawn(move || {
                for n in 0..10 {
                    let message = Message::new(vec![n])
                        .with_property("worker", worker.to_string());
                    session.send(&message).unwrap();
                }
            });
        }
    });

    let topics = session.transport().published_topics();
    assert_eq!(topics.len(), 40);
    for worker in 0..4 {
        let expected = format!("{PUBLISH_TOPIC}worker={worker}");
        assert_eq!(topics.iter().filter(|t| **t == expected).count(), 10);
    }
}
