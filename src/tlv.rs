//! TLV serialization helpers.
//!
//! Thin adapter over the engine's encoders. The returned buffer is owned by
//! the caller.

use tracing::error;

use crate::engine::ProtocolEngine;
use crate::error::{Lwm2mError, Result};

/// Encode an integer array as TLV resource instances.
pub fn serialize_int_array(engine: &dyn ProtocolEngine, values: &[i64]) -> Result<Vec<u8>> {
    if values.is_empty() {
        return Err(Lwm2mError::InvalidArgument(
            "integer array is empty".to_string(),
        ));
    }
    let encoded = engine.serialize_tlv_int(values).map_err(|status| {
        error!("Failed to serialize integer array (status {})", status);
        Lwm2mError::Protocol("failed to serialize integer array".to_string())
    })?;
    non_empty(encoded)
}

/// Encode a string array as TLV resource instances.
pub fn serialize_string_array<S: AsRef<str>>(
    engine: &dyn ProtocolEngine,
    values: &[S],
) -> Result<Vec<u8>> {
    if values.is_empty() {
        return Err(Lwm2mError::InvalidArgument(
            "string array is empty".to_string(),
        ));
    }
    let refs: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
    let encoded = engine.serialize_tlv_string(&refs).map_err(|status| {
        error!("Failed to serialize string array (status {})", status);
        Lwm2mError::Protocol("failed to serialize string array".to_string())
    })?;
    non_empty(encoded)
}

fn non_empty(encoded: Vec<u8>) -> Result<Vec<u8>> {
    if encoded.is_empty() {
        return Err(Lwm2mError::InvalidRange(
            "serialization produced no output".to_string(),
        ));
    }
    Ok(encoded)
}
