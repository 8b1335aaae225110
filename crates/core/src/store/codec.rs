use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, ShenmaError};

/// MessagePack, zstd-compressed.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let bytes = rmp_serde::to_vec(value)
        .map_err(|e| ShenmaError::Internal(format!("MSGPACK error: {}", e)))?;
    zstd::encode_all(&bytes[..], 0)
        .map_err(|e| ShenmaError::Internal(format!("ZSTD error: {}", e)))
}

pub fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    let bytes = zstd::decode_all(raw)
        .map_err(|e| ShenmaError::Storage(format!("ZSTD decompress error: {}", e)))?;
    rmp_serde::from_slice(&bytes)
        .map_err(|e| ShenmaError::Storage(format!("MSGPACK decode error: {}", e)))
}
