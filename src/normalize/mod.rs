pub mod coerce;
pub mod timestamp;

use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    db::models::{SensorRecord, UNKNOWN},
    errors::{CoercionError, ParseError},
};

/// Some firmwares publish `MQTT event: <free text> {...json...}`.
pub const PREFIX_MARKER: &str = "MQTT event:";

/// Turns a raw bus payload into a [`SensorRecord`].
///
/// Field-level coercion failures are logged and the field is left NULL; only
/// a payload without a usable JSON object is an error.
pub fn normalize(payload: &[u8]) -> Result<SensorRecord, ParseError> {
    let fields = extract_object(payload)?;
    let (record, failures) = build_record(&fields);
    for failure in &failures {
        warn!(
            field = failure.field,
            value = %failure.value,
            device_id = %record.device_id,
            "{failure}"
        );
    }
    Ok(record)
}

/// Decodes the payload, strips the optional marker prefix, and parses the
/// remainder as a JSON object.
pub fn extract_object(payload: &[u8]) -> Result<Map<String, Value>, ParseError> {
    let text = std::str::from_utf8(payload).map_err(|_| ParseError::InvalidUtf8 {
        raw: String::from_utf8_lossy(payload).into_owned(),
    })?;

    let json_text = if text.contains(PREFIX_MARKER) {
        let start = text.find('{').ok_or_else(|| ParseError::MissingObject {
            raw: text.to_owned(),
        })?;
        &text[start..]
    } else {
        text
    };

    match serde_json::from_str::<Value>(json_text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::NotAnObject {
            raw: text.to_owned(),
            kind: kind_of(&other),
        }),
        Err(source) => Err(ParseError::InvalidJson {
            raw: text.to_owned(),
            source,
        }),
    }
}

/// Fills every fixed-schema column from `fields`, returning the record along
/// with any fields that had to be dropped.
pub fn build_record(fields: &Map<String, Value>) -> (SensorRecord, Vec<CoercionError>) {
    let mut failures = Vec::new();

    let mut float = |name: &'static str| -> Option<f64> {
        let value = fields.get(name)?;
        coerce::to_float(name, value)
            .map_err(|e| failures.push(e))
            .ok()
            .flatten()
    };
    let temperature = float("temperature");
    let humidity = float("humidity");
    let pressure = float("pressure");

    let mut integer = |name: &'static str| -> Option<i64> {
        let value = fields.get(name)?;
        coerce::to_integer(name, value)
            .map_err(|e| failures.push(e))
            .ok()
            .flatten()
    };
    let wifi_rssi = integer("wifi_rssi");
    let uptime_seconds = integer("uptime_seconds");
    let fan_pwm = integer("fan_pwm");
    let fans_active_level = integer("fans_active_level");

    let text = |name: &str| fields.get(name).and_then(coerce::to_text);

    let record = SensorRecord {
        time: parse_time(fields),
        device_id: text("device_id").unwrap_or_else(|| UNKNOWN.to_owned()),
        event_type: text("event_type").unwrap_or_else(|| UNKNOWN.to_owned()),
        temperature,
        humidity,
        pressure,
        temp_sensor_type: text("temp_sensor_type"),
        motion: text("motion"),
        switch: text("switch"),
        version: text("version"),
        uptime: text("uptime"),
        wifi_rssi,
        uptime_seconds,
        fan_pwm,
        fans_active_level,
        sensor_type: text("sensor_type"),
    };

    (record, failures)
}

/// Reads the inbound `timestamp`. Empty, non-string, or unparseable values
/// are left for the store to default.
fn parse_time(fields: &Map<String, Value>) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    match fields.get("timestamp")? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => {
            let parsed = timestamp::parse(s);
            if parsed.is_none() {
                warn!(timestamp = %s, "Unparseable timestamp, using ingestion time");
            }
            parsed
        }
        other => {
            warn!(timestamp = %other, "Timestamp is not a string, using ingestion time");
            None
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
