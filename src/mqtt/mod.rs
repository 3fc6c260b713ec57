pub mod listener;

use rumqttc::{Event, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode};

use crate::config::MqttConfig;

pub use listener::BusListener;

/// Delivery level requested for the device subscription.
pub const SUBSCRIBE_QOS: QoS = QoS::AtMostOnce;

/// MQTT 3.1.1, clean session, plain TCP.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);
    options
}

// ---------------------------------------------------------------------------
// ListenerState
// ---------------------------------------------------------------------------

/// `Disconnected -> Connecting -> Subscribed -> Disconnected`
///
/// A CONNACK keeps the listener in `Connecting` until the broker grants the
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Subscribed,
}

impl ListenerState {
    pub fn next(self, event: &Event) -> Self {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => Self::Connecting,
            Event::Incoming(Packet::SubAck(ack)) if ack.return_codes.iter().any(is_granted) => {
                Self::Subscribed
            }
            Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => {
                Self::Disconnected
            }
            _ => self,
        }
    }
}

fn is_granted(code: &SubscribeReasonCode) -> bool {
    matches!(code, SubscribeReasonCode::Success(_))
}

/// Granted QoS per filter as plain numbers; `None` for a rejected filter.
pub fn granted_qos(codes: &[SubscribeReasonCode]) -> Vec<Option<u8>> {
    codes
        .iter()
        .map(|code| match code {
            SubscribeReasonCode::Success(qos) => Some(*qos as u8),
            SubscribeReasonCode::Failure => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rumqttc::{ConnAck, ConnectReturnCode, Publish, SubAck};

    use super::*;

    fn config() -> MqttConfig {
        MqttConfig {
            broker: "broker.local".to_owned(),
            port: 1884,
            topic: "iots6/#".to_owned(),
            client_id: "bridge-test".to_owned(),
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    fn connack() -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }))
    }

    fn suback(codes: Vec<SubscribeReasonCode>) -> Event {
        Event::Incoming(Packet::SubAck(SubAck {
            pkid: 1,
            return_codes: codes,
        }))
    }

    #[test]
    fn options_follow_config() {
        let options = mqtt_options(&config());
        assert_eq!(options.broker_address(), ("broker.local".to_owned(), 1884));
        assert_eq!(options.client_id(), "bridge-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.clean_session());
    }

    #[test]
    fn full_lifecycle() {
        let s = ListenerState::Connecting;
        let s = s.next(&connack());
        assert_eq!(s, ListenerState::Connecting);
        let s = s.next(&suback(vec![SubscribeReasonCode::Success(QoS::AtMostOnce)]));
        assert_eq!(s, ListenerState::Subscribed);
        let s = s.next(&Event::Incoming(Packet::Disconnect));
        assert_eq!(s, ListenerState::Disconnected);
    }

    #[test]
    fn rejected_subscription_does_not_subscribe() {
        let s = ListenerState::Connecting.next(&suback(vec![SubscribeReasonCode::Failure]));
        assert_eq!(s, ListenerState::Connecting);
    }

    #[test]
    fn publish_keeps_state() {
        let publish = Event::Incoming(Packet::Publish(Publish::new(
            "iots6/kitchen",
            QoS::AtMostOnce,
            r#"{"device_id":"d1"}"#,
        )));
        assert_eq!(
            ListenerState::Subscribed.next(&publish),
            ListenerState::Subscribed
        );
    }

    #[test]
    fn outgoing_disconnect_ends_session() {
        let s = ListenerState::Subscribed.next(&Event::Outgoing(Outgoing::Disconnect));
        assert_eq!(s, ListenerState::Disconnected);
    }

    #[test]
    fn granted_qos_reports_each_filter() {
        let codes = vec![
            SubscribeReasonCode::Success(QoS::AtLeastOnce),
            SubscribeReasonCode::Failure,
        ];
        assert_eq!(granted_qos(&codes), vec![Some(1), None]);
    }
}
