//! Typed values to and from cached bytes

use layercache_domain::CacheResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode `value` as JSON bytes
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode JSON bytes; malformed input is a `CacheError::Serialization`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
