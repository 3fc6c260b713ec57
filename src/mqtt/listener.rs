use std::{future::Future, time::Duration};

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet};
use tokio::time;
use tracing::{error, info, warn};

use crate::{
    config::MqttConfig,
    db::writer::RecordSink,
    errors::IngestError,
    ingest::IngestService,
};

use super::{granted_qos, mqtt_options, ListenerState, SUBSCRIBE_QOS};

/// Capacity of the request channel between `AsyncClient` and `EventLoop`.
const REQUEST_CAPACITY: usize = 10;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the MQTT event loop and feeds every publish through the
/// `IngestService`, one message at a time.
pub struct BusListener<S> {
    client: AsyncClient,
    eventloop: EventLoop,
    config: MqttConfig,
    ingest: IngestService<S>,
    state: ListenerState,
}

impl<S: RecordSink> BusListener<S> {
    pub fn new(config: &MqttConfig, ingest: IngestService<S>) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
        Self {
            client,
            eventloop,
            config: config.clone(),
            ingest,
            state: ListenerState::Disconnected,
        }
    }

    /// Runs until `shutdown` resolves, then disconnects from the broker.
    ///
    /// Connection errors are logged and the loop keeps polling; rumqttc
    /// reconnects on the next poll. A message being handled when `shutdown`
    /// fires is finished first.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            if self.state == ListenerState::Disconnected {
                info!(
                    broker = %self.config.broker,
                    port = self.config.port,
                    "Connecting to broker at {}:{}...",
                    self.config.broker,
                    self.config.port
                );
                self.state = ListenerState::Connecting;
            }

            tokio::select! {
                _ = &mut shutdown => break,
                polled = self.eventloop.poll() => match polled {
                    Ok(event) => self.on_event(event).await,
                    Err(e) => {
                        warn!(error = %e, "Disconnected with result: {e}");
                        self.state = ListenerState::Disconnected;
                        time::sleep(self.config.reconnect_delay).await;
                    }
                },
            }
        }

        info!("Shutting down...");
        self.disconnect().await;
    }

    async fn on_event(&mut self, event: Event) {
        let previous = self.state;
        self.state = previous.next(&event);

        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                info!(code = ?ack.code, "Connected with result code {:?}", ack.code);
                if ack.code == ConnectReturnCode::Success {
                    self.subscribe();
                }
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                let qos = granted_qos(&ack.return_codes);
                if self.state == ListenerState::Subscribed {
                    info!(qos = ?qos, "Subscribed successfully! QoS: {qos:?}");
                } else {
                    error!(topic = %self.config.topic, qos = ?qos, "Broker rejected subscription");
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                self.on_message(&publish.topic, &publish.payload).await;
            }
            Event::Incoming(Packet::Disconnect) => {
                info!("Disconnected by broker");
            }
            _ => {}
        }
    }

    fn subscribe(&self) {
        info!(topic = %self.config.topic, "Subscribing to {}", self.config.topic);
        if let Err(e) = self.client.try_subscribe(&self.config.topic, SUBSCRIBE_QOS) {
            error!(topic = %self.config.topic, error = %e, "Failed to request subscription");
        }
    }

    async fn on_message(&self, topic: &str, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload);
        info!(topic = %topic, "Received message on {topic}: {text}");

        match self.ingest.handle(topic, payload).await {
            Ok(()) => {}
            Err(IngestError::Parse(e)) => {
                error!(topic = %topic, raw = %e.raw(), error = %e, "Error decoding message");
            }
            Err(e @ IngestError::Write(_)) => {
                error!(topic = %topic, raw = %text, error = %e, "Error processing message");
            }
        }
    }

    /// Sends DISCONNECT and polls until it has left the socket.
    async fn disconnect(&mut self) {
        if self.state == ListenerState::Disconnected {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!(error = %e, "Failed to request disconnect");
            return;
        }

        let eventloop = &mut self.eventloop;
        let flushed = time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;

        if flushed.is_err() {
            warn!("Timed out waiting for broker disconnect");
        }
        self.state = ListenerState::Disconnected;
        info!("Disconnected from broker");
    }
}
