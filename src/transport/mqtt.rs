//! ==============================================================================
//! transport/mqtt.rs - broker adapter
//! ==============================================================================
//!
//! purpose:
//!     keeps one rumqttc connection to the broker alive, (re)subscribes every
//!     configured topic on each ConnAck and forwards publishes verbatim.
//!
//! relationships:
//!     - used by: transport/mod.rs (spawned for `kind = "mqtt"`)
//!     - reads: config.rs (MqttConfig), decode.rs (TopicMap for the topic set)
//!
//! ==============================================================================

use super::{emit, emit_status, wait_backoff, EventSender, TransportEvent};
use crate::config::MqttConfig;
use crate::decode::TopicMap;
use crate::health::LinkEvent;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// how long teardown waits for the DISCONNECT packet to go out
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

pub struct MqttAdapter {
    options: MqttOptions,
    capacity: usize,
    topics: Vec<String>,
    backoff: Duration,
}

impl MqttAdapter {
    pub fn new(config: &MqttConfig, topics: &TopicMap, backoff: Duration) -> Self {
        let mut options = if config.websocket {
            let url = format!("ws://{}:{}", config.host, config.port);
            let mut options = MqttOptions::new(&config.client_id, url, config.port);
            options.set_transport(Transport::Ws);
            options
        } else {
            MqttOptions::new(&config.client_id, &config.host, config.port)
        };
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        Self {
            options,
            capacity: config.channel_capacity.max(topics.topics().count()),
            topics: topics.topics().map(str::to_string).collect(),
            backoff,
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub async fn run(self, events: EventSender, shutdown: CancellationToken) {
        let (host, port) = self.options.broker_address();
        tracing::info!(host = %host, port, "connecting to mqtt broker");

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), self.capacity);
        if !emit_status(&events, LinkEvent::Connecting).await {
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    close(&client, &mut eventloop, &self.topics).await;
                    break;
                }

                polled = eventloop.poll() => {
                    let delivered = match polled {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            tracing::info!("mqtt connected");
                            self.subscribe_all(&client);
                            emit_status(&events, LinkEvent::Connected).await
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            emit(&events, TransportEvent::Message {
                                topic: p.topic.clone(),
                                payload: p.payload.to_vec(),
                            })
                            .await
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            tracing::warn!("mqtt broker sent disconnect");
                            emit_status(&events, LinkEvent::Disconnected {
                                error: Some("Disconnected".to_string()),
                            })
                            .await
                        }
                        Ok(_) => true,
                        Err(e) => {
                            tracing::warn!(error = %e, backoff_ms = self.backoff.as_millis() as u64, "mqtt connection lost, retrying");
                            if !emit_status(&events, LinkEvent::Disconnected { error: Some(e.to_string()) }).await {
                                return;
                            }
                            if !wait_backoff(self.backoff, &shutdown).await {
                                break;
                            }
                            emit_status(&events, LinkEvent::Connecting).await
                        }
                    };

                    if !delivered {
                        tracing::debug!("engine gone, stopping mqtt adapter");
                        return;
                    }
                }
            }
        }

        emit_status(&events, LinkEvent::Disconnected { error: None }).await;
        tracing::info!("mqtt adapter stopped");
    }

    /// queue a subscription for every topic without blocking the event loop
    fn subscribe_all(&self, client: &AsyncClient) {
        for topic in &self.topics {
            match client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                Ok(()) => tracing::debug!(topic = %topic, "subscribed"),
                Err(e) => tracing::error!(topic = %topic, error = %e, "failed to subscribe"),
            }
        }
    }
}

/// unsubscribe, send DISCONNECT and give the event loop a moment to flush it
async fn close(client: &AsyncClient, eventloop: &mut EventLoop, topics: &[String]) {
    for topic in topics {
        let _ = client.try_unsubscribe(topic.as_str());
    }
    if client.try_disconnect().is_err() {
        return;
    }
    let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        tracing::debug!("mqtt disconnect not acknowledged before grace period");
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribes_every_configured_topic() {
        let adapter = MqttAdapter::new(&MqttConfig::default(), &TopicMap::default(), Duration::from_secs(1));
        assert_eq!(
            adapter.topics(),
            &["ppr/temp/t1", "ppr/temp/t2", "ppr/temp/t3", "ppr/power", "ppr/vib/fft", "ppr/tilt/angle"]
        );
        assert!(adapter.capacity >= 6);
    }

    #[test]
    fn plain_tcp_uses_host_and_port() {
        let config = MqttConfig { host: "broker.local".into(), port: 1884, ..Default::default() };
        let adapter = MqttAdapter::new(&config, &TopicMap::default(), Duration::from_secs(1));
        let (host, port) = adapter.options.broker_address();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 1884);
        assert_eq!(adapter.options.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn websocket_listener_uses_ws_url() {
        let config = MqttConfig { host: "10.1.1.2".into(), port: 1884, websocket: true, ..Default::default() };
        let adapter = MqttAdapter::new(&config, &TopicMap::default(), Duration::from_secs(1));
        let (host, _) = adapter.options.broker_address();
        assert_eq!(host, "ws://10.1.1.2:1884");
    }
}
