use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Fallback for `device_id` and `event_type` when a message omits them.
pub const UNKNOWN: &str = "unknown";

/// One row of the `sensor_data` table.
///
/// Every column is always present; absent inbound fields stay `None` and are
/// written as explicit NULLs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecord {
    /// Inbound `timestamp`, always zone-aware. `None` lets the store use `now()`.
    pub time: Option<DateTime<FixedOffset>>,
    pub device_id: String,
    pub event_type: String,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub temp_sensor_type: Option<String>,
    pub motion: Option<String>,
    pub switch: Option<String>,
    pub version: Option<String>,
    pub uptime: Option<String>,
    /// dBm
    pub wifi_rssi: Option<i64>,
    pub uptime_seconds: Option<i64>,
    pub fan_pwm: Option<i64>,
    pub fans_active_level: Option<i64>,
    pub sensor_type: Option<String>,
}

impl Default for SensorRecord {
    fn default() -> Self {
        Self {
            time: None,
            device_id: UNKNOWN.to_owned(),
            event_type: UNKNOWN.to_owned(),
            temperature: None,
            humidity: None,
            pressure: None,
            temp_sensor_type: None,
            motion: None,
            switch: None,
            version: None,
            uptime: None,
            wifi_rssi: None,
            uptime_seconds: None,
            fan_pwm: None,
            fans_active_level: None,
            sensor_type: None,
        }
    }
}
