use thiserror::Error;

use crate::db::models::SensorRecord;

/// A payload that could not be turned into a JSON object.
///
/// Every variant keeps the offending text so the listener can log it.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8 { raw: String },

    #[error("no JSON object found in message")]
    MissingObject { raw: String },

    #[error("error decoding JSON: {source}")]
    InvalidJson {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON object, got {kind}")]
    NotAnObject { raw: String, kind: &'static str },
}

impl ParseError {
    pub fn raw(&self) -> &str {
        match self {
            ParseError::InvalidUtf8 { raw }
            | ParseError::MissingObject { raw }
            | ParseError::InvalidJson { raw, .. }
            | ParseError::NotAnObject { raw, .. } => raw,
        }
    }
}

/// A single field whose value could not be converted to its column type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for {field}: {value}, setting to None")]
pub struct CoercionError {
    pub field: &'static str,
    /// The inbound JSON value, rendered as text.
    pub value: String,
}

/// A store-level failure while inserting one record. The transaction has
/// already been rolled back by the time this is returned.
#[derive(Debug, Error)]
#[error("error storing {event_type} data for device {device_id}: {source}")]
pub struct WriteError {
    pub event_type: String,
    pub device_id: String,
    #[source]
    pub source: sqlx::Error,
}

impl WriteError {
    pub fn new(record: &SensorRecord, source: sqlx::Error) -> Self {
        Self {
            event_type: record.event_type.clone(),
            device_id: record.device_id.clone(),
            source,
        }
    }
}

/// Anything that stops one inbound message from being persisted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
