//! Record encoding
//!
//! The payload format is pluggable. The store only needs to turn a record
//! into bytes and back, and to tell a decode failure apart from a missing
//! file so corrupt entries can be purged.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;
use crate::record::CacheRecord;

/// Encodes and decodes [`CacheRecord`]s.
pub trait RecordCodec: Send + Sync {
    /// Serialize a record to bytes.
    fn encode<V: Serialize>(&self, record: &CacheRecord<V>) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a record. Any malformed input is a [`CodecError::Decode`].
    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<CacheRecord<V>, CodecError>;
}

/// JSON record encoding via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    fn encode<V: Serialize>(&self, record: &CacheRecord<V>) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(record).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<CacheRecord<V>, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Decode("empty record".to_string()));
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
