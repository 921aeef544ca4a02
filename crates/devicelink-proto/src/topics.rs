//! MQTT topic scheme for a single device.
//!
//! Topic structure: `devices/{device_id}/messages/{direction}/`
//!
//! All topics are derived once from the device id and never change, even if
//! the underlying connection is re-established.

/// Root level shared by every device topic.
pub const DEVICES_ROOT: &str = "devices";

/// Characters that would change the level structure of a topic or turn it into
/// a wildcard filter.
const FORBIDDEN_ID_CHARS: [char; 3] = ['/', '#', '+'];

/// Topics derived from a device identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    device_id: String,
    publish: String,
    subscribe: String,
    receive_prefix: String,
}

impl DeviceTopics {
    /// Derive the topic set for a device.
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty, blank, or contains `/`, `#` or `+`.
    pub fn new(device_id: impl Into<String>) -> Result<Self, TopicError> {
        let device_id = device_id.into();

        if device_id.trim().is_empty() {
            return Err(TopicError::EmptyDeviceId);
        }
        if let Some(found) = device_id.chars().find(|c| FORBIDDEN_ID_CHARS.contains(c)) {
            return Err(TopicError::ForbiddenCharacter {
                device_id,
                character: found,
            });
        }

        let base = format!("{DEVICES_ROOT}/{device_id}/messages");

        Ok(Self {
            publish: format!("{base}/events/"),
            subscribe: format!("{base}/devicebound/#"),
            receive_prefix: format!("{base}/devicebound/"),
            device_id,
        })
    }

    /// The device identifier the topics were derived from.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Base topic for device-to-cloud messages.
    #[must_use]
    pub fn publish_topic(&self) -> &str {
        &self.publish
    }

    /// Wildcard filter for cloud-to-device messages.
    #[must_use]
    pub fn subscribe_topic(&self) -> &str {
        &self.subscribe
    }

    /// Prefix shared by every cloud-to-device message topic.
    #[must_use]
    pub fn receive_prefix(&self) -> &str {
        &self.receive_prefix
    }
}

/// Errors raised while deriving device topics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// Device id is empty or whitespace only
    #[error("device id must not be empty")]
    EmptyDeviceId,
    /// Device id contains a topic level separator or wildcard
    #[error("device id '{device_id}' contains forbidden character '{character}'")]
    ForbiddenCharacter {
        /// The rejected id
        device_id: String,
        /// First offending character
        character: char,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_generation() {
        let topics = DeviceTopics::new("sensor-042").unwrap();

        assert_eq!(topics.publish_topic(), "devices/sensor-042/messages/events/");
        assert_eq!(
            topics.subscribe_topic(),
            "devices/sensor-042/messages/devicebound/#"
        );
        assert_eq!(
            topics.receive_prefix(),
            "devices/sensor-042/messages/devicebound/"
        );
        assert_eq!(topics.device_id(), "sensor-042");
    }

    #[test]
    fn topics_share_device_id_at_second_level() {
        for id in ["a", "thermostat.kitchen", "dev_01:blue", "устройство"] {
            let topics = DeviceTopics::new(id).unwrap();
            for topic in [
                topics.publish_topic(),
                topics.subscribe_topic(),
                topics.receive_prefix(),
            ] {
                let levels: Vec<&str> = topic.split('/').collect();
                assert_eq!(levels[0], "devices");
                assert_eq!(levels[1], id, "topic {topic} should carry {id}");
            }
        }
    }

    #[test]
    fn topics_are_stable_across_reads() {
        let topics = DeviceTopics::new("dev1").unwrap();
        let first = topics.publish_topic().to_string();
        let cloned = topics.clone();

        assert_eq!(topics.publish_topic(), first);
        assert_eq!(cloned, topics);
    }

    #[test]
    fn rejects_empty_device_id() {
        assert_eq!(DeviceTopics::new(""), Err(TopicError::EmptyDeviceId));
        assert_eq!(DeviceTopics::new("   "), Err(TopicError::EmptyDeviceId));
    }

    #[test]
    fn rejects_separator_and_wildcards() {
        for (id, character) in [("a/b", '/'), ("dev#", '#'), ("+", '+')] {
            let err = DeviceTopics::new(id).unwrap_err();
            assert_eq!(
                err,
                TopicError::ForbiddenCharacter {
                    device_id: id.to_string(),
                    character,
                }
            );
        }
    }
}
