//! Decoder for stream-event envelopes
//!
//! An envelope carries the records of one shard:
//!
//! ```json
//! {
//!   "Records": [
//!     {
//!       "eventID": "shardId-000000000000:4954...",
//!       "kinesis": {
//!         "data": "eyJpZCI6IDF9",
//!         "approximateArrivalTimestamp": 1700000000.25
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Each `data` field is a base64 encoded JSON object.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use conduit_core::{DecodeError, DecodedBatch, Record, RecordBatchDecoder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "Records")]
    records: Vec<StreamRecord>,
}

#[derive(Debug, Deserialize)]
struct StreamRecord {
    #[serde(rename = "eventID")]
    event_id: String,
    kinesis: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    data: String,
    #[serde(rename = "approximateArrivalTimestamp", default)]
    arrival: Option<f64>,
}

/// Decodes stream-event envelopes into record batches.
///
/// The partition id of the batch is the shard id that prefixes the
/// `eventID` of its first record.
#[derive(Debug, Clone, Default)]
pub struct StreamEventDecoder {
    received_at_field: Option<String>,
}

impl StreamEventDecoder {
    /// Creates a decoder that leaves payloads untouched.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            received_at_field: None,
        }
    }

    /// Embeds the arrival time of each record, as RFC 3339, under `field`.
    /// Records without an arrival time get the decoding time.
    #[must_use]
    pub fn with_received_at(mut self, field: impl Into<String>) -> Self {
        self.received_at_field = Some(field.into());
        self
    }

    fn received_at(arrival: Option<f64>) -> String {
        arrival
            .and_then(|seconds| {
                #[allow(clippy::cast_possible_truncation)]
                let millis = (seconds * 1000.0).round() as i64;
                DateTime::<Utc>::from_timestamp_millis(millis)
            })
            .unwrap_or_else(Utc::now)
            .to_rfc3339()
    }
}

/// Parses one payload into a record.
///
/// # Errors
///
/// Returns [`DecodeError::Payload`] when the bytes are not a JSON object.
pub fn decode_payload(index: usize, bytes: &[u8]) -> Result<Record, DecodeError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(DecodeError::Payload {
            index,
            reason: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(DecodeError::Payload {
            index,
            reason: e.to_string(),
        }),
    }
}

fn shard_id(event_id: &str) -> &str {
    event_id.split_once(':').map_or(event_id, |(shard, _)| shard)
}

impl RecordBatchDecoder for StreamEventDecoder {
    fn decode(&self, raw: &[u8]) -> Result<DecodedBatch, DecodeError> {
        let event: StreamEvent =
            serde_json::from_slice(raw).map_err(|e| DecodeError::Envelope(e.to_string()))?;

        let partition_id = event
            .records
            .first()
            .map(|record| shard_id(&record.event_id).to_string())
            .unwrap_or_default();

        let records = event
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let shard = shard_id(&record.event_id);
                if shard != partition_id {
                    warn!("Record #{index} comes from shard {shard}, batch is {partition_id}");
                }
                let bytes = STANDARD
                    .decode(record.kinesis.data.as_bytes())
                    .map_err(|e| DecodeError::Payload {
                        index,
                        reason: e.to_string(),
                    })?;
                let mut decoded = decode_payload(index, &bytes)?;
                if let Some(field) = &self.received_at_field {
                    decoded.insert(
                        field.clone(),
                        Value::String(Self::received_at(record.kinesis.arrival)),
                    );
                }
                Ok(decoded)
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        debug!("Decoded {} records from shard {partition_id}", records.len());
        Ok(DecodedBatch::new(records, partition_id))
    }
}
