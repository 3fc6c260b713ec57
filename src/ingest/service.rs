use std::time::Instant;

use tracing::{debug, error};

use crate::{db::writer::RecordSink, errors::IngestError, normalize};

pub struct IngestService<S> {
    sink: S,
}

impl<S: RecordSink> IngestService<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Normalizes one bus message and hands it to the sink.
    ///
    /// Errors describe why this message was dropped; they never affect the
    /// next call.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Result<(), IngestError> {
        let started = Instant::now();

        let record = normalize::normalize(payload)?;

        if let Err(e) = self.sink.store(&record).await {
            error!(
                topic = %topic,
                record = %serde_json::to_string(&record).unwrap_or_default(),
                "Data that caused error"
            );
            return Err(e.into());
        }

        debug!(
            topic = %topic,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Message processing time"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        db::models::SensorRecord,
        errors::{ParseError, WriteError},
    };

    /// Collects stored records; refuses any record from `fail_device`.
    #[derive(Default)]
    struct MemorySink {
        stored: Mutex<Vec<SensorRecord>>,
        fail_device: Option<&'static str>,
    }

    impl MemorySink {
        fn failing_for(device_id: &'static str) -> Self {
            Self {
                fail_device: Some(device_id),
                ..Self::default()
            }
        }

        fn device_ids(&self) -> Vec<String> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.device_id.clone())
                .collect()
        }
    }

    impl RecordSink for MemorySink {
        async fn store(&self, record: &SensorRecord) -> Result<(), WriteError> {
            if self.fail_device == Some(record.device_id.as_str()) {
                return Err(WriteError::new(
                    record,
                    sqlx::Error::Protocol("check constraint violated".into()),
                ));
            }
            self.stored.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn valid_message_is_stored() {
        let service = IngestService::new(MemorySink::default());
        service
            .handle("iots6/kitchen", br#"{"device_id":"d1","temperature":21.5}"#)
            .await
            .unwrap();
        assert_eq!(service.sink.device_ids(), vec!["d1"]);
    }

    #[tokio::test]
    async fn parse_failure_is_reported_and_nothing_is_stored() {
        let service = IngestService::new(MemorySink::default());
        let err = service
            .handle("iots6/kitchen", b"MQTT event: no json here")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::MissingObject { .. })));
        assert!(service.sink.device_ids().is_empty());
    }

    #[tokio::test]
    async fn coercion_failure_still_stores_record() {
        let service = IngestService::new(MemorySink::default());
        service
            .handle("iots6/garage", br#"{"device_id":"d1","fan_pwm":"fast"}"#)
            .await
            .unwrap();
        let stored = service.sink.stored.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fan_pwm, None);
    }

    #[tokio::test]
    async fn write_failure_does_not_block_next_message() {
        let service = IngestService::new(MemorySink::failing_for("bad"));

        let err = service
            .handle("iots6/a", br#"{"device_id":"bad","event_type":"telemetry"}"#)
            .await
            .unwrap_err();
        match err {
            IngestError::Write(e) => {
                assert_eq!(e.device_id, "bad");
                assert_eq!(e.event_type, "telemetry");
            }
            other => panic!("expected write error, got {other:?}"),
        }

        service
            .handle("iots6/b", br#"{"device_id":"good"}"#)
            .await
            .unwrap();
        assert_eq!(service.sink.device_ids(), vec!["good"]);
    }

    #[tokio::test]
    async fn malformed_message_does_not_block_next_message() {
        let service = IngestService::new(MemorySink::default());
        assert!(service.handle("iots6/a", b"{not json").await.is_err());
        service
            .handle("iots6/a", br#"MQTT event: {"device_id":"d2"}"#)
            .await
            .unwrap();
        assert_eq!(service.sink.device_ids(), vec!["d2"]);
    }
}
