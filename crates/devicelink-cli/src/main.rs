//! # devicelink CLI
//!
//! Send device-to-cloud telemetry and inspect publish topic encoding.

use anyhow::{Context, Result};
use devicelink_proto::{encode_topic, validate_properties, DeviceTopics, Message, MessageProperty};
use devicelink_session::{MessagingSession, MqttTransport};
use std::env;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "topic" => {
            if args.len() < 3 {
                eprintln!(
                    "Usage: devicelink topic <device-id> [name=value ...] [--message-id <id>]"
                );
                std::process::exit(1);
            }
            let topics = DeviceTopics::new(args[2].as_str()).context("Invalid device id")?;
            let options = MessageArgs::parse(&args[3..])?;
            let message_id = options.message_id();
            validate_properties(&options.properties, message_id.as_deref())?;

            let topic = encode_topic(
                topics.publish_topic(),
                &options.properties,
                message_id.as_deref(),
            );
            println!("{topic}");
        }
        "send" => {
            if args.len() < 3 {
                eprintln!(
                    "Usage: devicelink send <payload> [name=value ...] [--message-id <id> | --auto-id]"
                );
                std::process::exit(1);
            }
            let options = MessageArgs::parse(&args[3..])?;
            send(&args[2], options)?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn send(payload: &str, options: MessageArgs) -> Result<()> {
    let config = config::device_config_from_env()?;
    let defaults = config::default_properties_from_env()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        device_id = %config.device_id,
        "Starting devicelink"
    );

    let mut message = Message::new(payload)
        .with_properties(defaults)
        .with_properties(options.properties.iter().cloned());
    if let Some(id) = options.message_id() {
        message = message.with_message_id(id);
    }

    let transport = MqttTransport::new(&config).context("Failed to create MQTT transport")?;
    let mut session =
        MessagingSession::new(&config, transport).context("Failed to create messaging session")?;

    session.start().context("Failed to start session")?;
    let sent = session.send(&message);
    let stopped = session.stop();

    sent.context("Failed to send message")?;
    stopped.context("Failed to stop session")?;

    tracing::info!(
        message_id = message.message_id().unwrap_or("-"),
        payload_len = payload.len(),
        "Message sent"
    );
    Ok(())
}

/// Properties and message id given on the command line.
#[derive(Debug, Default, PartialEq, Eq)]
struct MessageArgs {
    properties: Vec<MessageProperty>,
    message_id: Option<String>,
    auto_id: bool,
}

impl MessageArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--message-id" => {
                    let id = args.next().context("--message-id requires a value")?;
                    parsed.message_id = Some(id.clone());
                }
                "--auto-id" => parsed.auto_id = true,
                pair => {
                    let (name, value) = pair
                        .split_once('=')
                        .with_context(|| format!("Expected name=value, got '{pair}'"))?;
                    parsed.properties.push(MessageProperty::new(name, value));
                }
            }
        }

        if parsed.auto_id && parsed.message_id.is_some() {
            anyhow::bail!("--message-id and --auto-id cannot be combined");
        }
        Ok(parsed)
    }

    fn message_id(&self) -> Option<String> {
        if self.auto_id {
            return Some(Uuid::new_v4().to_string());
        }
        self.message_id.clone()
    }
}

fn print_help() {
    println!(
        r#"devicelink CLI

USAGE:
    devicelink <COMMAND> [OPTIONS]

COMMANDS:
    topic <device-id> [name=value ...]   Print the publish topic for a message
    send <payload> [name=value ...]      Send one message using DEVICELINK_* settings
    help                                 Show this help message

OPTIONS:
    --message-id <id>   Attach a message id
    --auto-id           Attach a random message id

EXAMPLES:
    devicelink topic dev1 alert=high --message-id m1
    devicelink send '{{"temperature":21.5}}' source=cli --auto-id
"#
    );
}
