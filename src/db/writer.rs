use std::future::Future;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info};

use crate::{db::models::SensorRecord, errors::WriteError};

/// Destination for normalized records.
pub trait RecordSink {
    fn store(&self, record: &SensorRecord) -> impl Future<Output = Result<(), WriteError>> + Send;
}

const INSERT_SENSOR_DATA: &str = r#"
    INSERT INTO sensor_data (
        time, device_id, event_type, temperature, humidity,
        pressure, temp_sensor_type, motion, switch, version, uptime,
        wifi_rssi, uptime_seconds, fan_pwm, fans_active_level, sensor_type
    )
    VALUES (
        COALESCE($1, now()), $2, $3, $4, $5,
        $6, $7, $8, $9, $10, $11,
        $12, $13, $14, $15, $16
    )
"#;

/// Appends one row per record to `sensor_data`. Not an upsert: repeated
/// `(time, device_id)` pairs are stored as separate rows.
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    pool: PgPool,
}

impl PersistenceWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts `record` in its own transaction. On failure the transaction is
    /// rolled back before the error is returned, so the connection is clean
    /// for the next record.
    pub async fn store(&self, record: &SensorRecord) -> Result<(), WriteError> {
        debug!(
            motion = ?record.motion,
            switch = ?record.switch,
            wifi_rssi = ?record.wifi_rssi,
            fan_pwm = ?record.fan_pwm,
            sensor_type = ?record.sensor_type,
            "Storing data"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WriteError::new(record, e))?;

        if let Err(e) = insert(&mut tx, record).await {
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    device_id = %record.device_id,
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            return Err(WriteError::new(record, e));
        }

        tx.commit().await.map_err(|e| WriteError::new(record, e))?;

        info!(
            event_type = %record.event_type,
            device_id = %record.device_id,
            "Stored {} data for device {}",
            record.event_type,
            record.device_id
        );
        Ok(())
    }
}

impl RecordSink for PersistenceWriter {
    fn store(&self, record: &SensorRecord) -> impl Future<Output = Result<(), WriteError>> + Send {
        PersistenceWriter::store(self, record)
    }
}

async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    record: &SensorRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(INSERT_SENSOR_DATA)
        .bind(record.time)
        .bind(&record.device_id)
        .bind(&record.event_type)
        .bind(record.temperature)
        .bind(record.humidity)
        .bind(record.pressure)
        .bind(record.temp_sensor_type.as_deref())
        .bind(record.motion.as_deref())
        .bind(record.switch.as_deref())
        .bind(record.version.as_deref())
        .bind(record.uptime.as_deref())
        .bind(record.wifi_rssi)
        .bind(record.uptime_seconds)
        .bind(record.fan_pwm)
        .bind(record.fans_active_level)
        .bind(record.sensor_type.as_deref())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
