//! Matrix reached over MQTT.
//!
//! The device (or a bridge in front of it) listens on `{prefix}/register`
//! and `{prefix}/frame`, and publishes button presses to `{prefix}/event`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use linkme::distributed_slice;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::MqttDisplayConfig;
use super::DISPLAY_REGISTRY;
use super::DisplayContext;
use super::DisplayDriver;
use super::DisplayError;
use super::DisplayFactoryResult;
use super::DriverLink;
use super::MatrixFrame;

#[distributed_slice(DISPLAY_REGISTRY)]
static MQTT_DISPLAY: fn(&DisplayContext) -> DisplayFactoryResult = create_mqtt_display;

fn create_mqtt_display(ctx: &DisplayContext) -> DisplayFactoryResult {
    let display = &ctx.config.display;
    if display.driver != "mqtt" {
        return Ok(None);
    }
    let mqtt = display
        .mqtt
        .as_ref()
        .context("display.driver = \"mqtt\" requires a [display.mqtt] section")?;
    Ok(Some(Box::new(MqttDisplay::new(
        mqtt,
        display.width,
        display.height,
    ))))
}

fn default_client_id() -> String {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("glyphd-{}", hostname)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Topics {
    register: String,
    frame: String,
    event: String,
}

impl Topics {
    fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            register: format!("{}/register", prefix),
            frame: format!("{}/frame", prefix),
            event: format!("{}/event", prefix),
        }
    }
}

#[derive(Serialize)]
struct FramePayload<'a> {
    device: &'a str,
    #[serde(flatten)]
    frame: &'a MatrixFrame,
}

fn frame_payload(device_id: &str, frame: &MatrixFrame) -> Result<Vec<u8>, DisplayError> {
    serde_json::to_vec(&FramePayload {
        device: device_id,
        frame,
    })
    .map_err(|e| DisplayError::Frame(e.to_string()))
}

pub struct MqttDisplay {
    options: MqttOptions,
    topics: Topics,
    width: usize,
    height: usize,
    client: Option<AsyncClient>,
    event_loop_task: Option<JoinHandle<()>>,
    device_id: Option<String>,
}

impl MqttDisplay {
    pub fn new(config: &MqttDisplayConfig, width: usize, height: usize) -> Self {
        let client_id = config.client_id.clone().unwrap_or_else(default_client_id);
        let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        Self {
            options,
            topics: Topics::new(&config.topic_prefix),
            width,
            height,
            client: None,
            event_loop_task: None,
            device_id: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, DisplayError> {
        self.client.as_ref().ok_or(DisplayError::Disconnected)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), DisplayError> {
        self.client()?
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| DisplayError::Transport(e.to_string()))
    }

    fn stop_event_loop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl DisplayDriver for MqttDisplay {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    async fn connect(&mut self, link: DriverLink) -> Result<(), DisplayError> {
        self.stop_event_loop();

        let (client, mut event_loop) = AsyncClient::new(self.options.clone(), 10);
        client
            .subscribe(&self.topics.event, QoS::AtMostOnce)
            .await
            .map_err(|e| DisplayError::Transport(e.to_string()))?;

        let event_topic = self.topics.event.clone();
        let task = tokio::spawn(async move {
            let mut connected = false;
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) if !connected => {
                        connected = true;
                        link.connected();
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == event_topic => {
                        match std::str::from_utf8(&publish.payload) {
                            Ok(name) => link.hardware_event(name.trim()),
                            Err(_) => warn!("Ignoring non-UTF-8 event payload"),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT display connection lost: {}", e);
                        link.disconnected();
                        break;
                    }
                }
            }
            debug!("MQTT display event loop exiting");
        });

        info!(
            "Connecting to MQTT display at {:?}",
            self.options.broker_address()
        );
        self.client = Some(client);
        self.event_loop_task = Some(task);
        Ok(())
    }

    async fn register(&mut self, device_id: &str) -> Result<(), DisplayError> {
        self.publish(&self.topics.register, device_id.as_bytes().to_vec())
            .await?;
        self.device_id = Some(device_id.to_string());
        Ok(())
    }

    async fn push(&mut self, frame: MatrixFrame) -> Result<(), DisplayError> {
        let device_id = self.device_id.as_deref().ok_or(DisplayError::NotRegistered)?;
        let payload = frame_payload(device_id, &frame)?;
        self.publish(&self.topics.frame, payload).await
    }

    async fn unregister(&mut self) -> Result<(), DisplayError> {
        if self.device_id.take().is_some() {
            self.publish(&self.topics.register, Vec::new()).await?;
        }
        Ok(())
    }

    async fn release(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                debug!("MQTT disconnect failed: {}", e);
            }
        }
        self.stop_event_loop();
    }
}

impl Drop for MqttDisplay {
    fn drop(&mut self) {
        self.stop_event_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::SpriteKind;

    fn config() -> MqttDisplayConfig {
        MqttDisplayConfig {
            broker: "broker.local".to_string(),
            port: 1883,
            client_id: Some("glyphd-test".to_string()),
            topic_prefix: "glyph/".to_string(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn test_topics() {
        let topics = Topics::new("glyph/");
        assert_eq!(topics.register, "glyph/register");
        assert_eq!(topics.frame, "glyph/frame");
        assert_eq!(topics.event, "glyph/event");
    }

    #[test]
    fn test_frame_payload() {
        let display = MqttDisplay::new(&config(), 2, 2);
        let frame = display.build_frame(&SpriteKind::Error.fallback()).unwrap();
        let payload = frame_payload("DEVICE_23112", &frame).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "device": "DEVICE_23112",
                "width": 2,
                "height": 2,
                "levels": [255, 0, 0, 255],
            })
        );
    }

    #[tokio::test]
    async fn test_register_before_connect_fails() {
        let mut display = MqttDisplay::new(&config(), 25, 25);
        assert!(matches!(
            display.register("DEVICE_23112").await,
            Err(DisplayError::Disconnected)
        ));
        let frame = display.build_frame(&SpriteKind::On.fallback()).unwrap();
        assert!(matches!(
            display.push(frame).await,
            Err(DisplayError::NotRegistered)
        ));
    }
}
