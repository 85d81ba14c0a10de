//! MQTT touch feed
//!
//! Subscribes to a topic on which a touch surface publishes positions as
//! `{"x": 140.0, "y": 60.0}` (or plain `140 60`). An empty payload or
//! `{"release": true}` clears the touch point.

use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use bodyblend::{CompositeError, Point, Result};

pub const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "bodyblend/touch";

/// Touch update from the feed; `None` releases the touch point
pub type TouchUpdate = Option<Point>;

#[derive(Deserialize)]
struct JsonTouch {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    release: bool,
}

/// MQTT client that receives touch points in a background thread
pub struct TouchFeed {
    receiver: Receiver<TouchUpdate>,
    _thread: thread::JoinHandle<()>,
}

impl TouchFeed {
    /// Connect to the broker. Fails immediately if the broker is unreachable.
    pub fn connect(host: &str, topic: &str) -> Result<Self> {
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let topic = if topic.is_empty() { DEFAULT_TOPIC } else { topic };

        let mut options = MqttOptions::new("bodyblend", host, DEFAULT_PORT);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(options, 10);
        client.subscribe(topic, QoS::AtMostOnce).map_err(|e| {
            CompositeError::Config(format!("failed to subscribe to '{}': {}", topic, e))
        })?;

        // fail fast if the broker is unreachable
        match connection.iter().next() {
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                return Err(CompositeError::Config(format!(
                    "failed to connect to MQTT broker at {}:{}: {}",
                    host, DEFAULT_PORT, e
                )));
            },
            None => {
                return Err(CompositeError::Config(format!(
                    "failed to connect to MQTT broker at {}:{}: connection closed",
                    host, DEFAULT_PORT
                )));
            },
        }

        let (sender, receiver) = mpsc::channel();
        let topic_owned = topic.to_string();
        let handle = thread::Builder::new()
            .name("bodyblend-mqtt".to_string())
            .spawn(move || Self::message_loop(connection, sender, &topic_owned))?;

        log::info!("MQTT: connected to {}:{}, subscribed to '{}'", host, DEFAULT_PORT, topic);
        Ok(Self {
            receiver,
            _thread: handle,
        })
    }

    fn message_loop(mut connection: rumqttc::Connection, sender: Sender<TouchUpdate>, topic: &str) {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic => {
                    let Ok(text) = std::str::from_utf8(&publish.payload) else {
                        continue;
                    };
                    match parse_touch(text) {
                        Some(update) => {
                            if sender.send(update).is_err() {
                                break;
                            }
                        },
                        None => log::debug!("MQTT: ignoring payload {:?}", text),
                    }
                },
                Ok(_) => {},
                Err(e) => {
                    // rumqttc reconnects on the next iteration
                    log::warn!("MQTT error: {}", e);
                },
            }
        }
    }

    /// Latest update since the last poll, discarding older ones
    pub fn poll(&self) -> Option<TouchUpdate> {
        self.receiver.try_iter().last()
    }
}

/// JSON first, then two whitespace-separated numbers
pub fn parse_touch(text: &str) -> Option<TouchUpdate> {
    let text = text.trim();
    if text.is_empty() {
        return Some(None);
    }
    if let Ok(json) = serde_json::from_str::<JsonTouch>(text) {
        if json.release {
            return Some(None);
        }
        let p = Point::new(json.x, json.y);
        return p.is_finite().then_some(Some(p));
    }
    let mut parts = text.split_whitespace().map(str::parse::<f32>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) => {
            let p = Point::new(x, y);
            p.is_finite().then_some(Some(p))
        },
        _ => None,
    }
}
