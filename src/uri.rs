//! Well-known LWM2M resource URIs.
//!
//! Paths are `/<object>/<instance>/<resource>`. The engine stores a URI in a
//! fixed field of [`MAX_URI_LEN`] bytes; longer paths are rejected before they
//! reach it.

#![allow(missing_docs)]

use crate::error::{Lwm2mError, Result};

/// Capacity of a resource URI field, in bytes.
pub const MAX_URI_LEN: usize = 16;

// Device object (/3)
pub const DEVICE_MANUFACTURER: &str = "/3/0/0";
pub const DEVICE_MODEL_NUMBER: &str = "/3/0/1";
pub const DEVICE_SERIAL_NUMBER: &str = "/3/0/2";
pub const DEVICE_FIRMWARE_VERSION: &str = "/3/0/3";
pub const DEVICE_REBOOT: &str = "/3/0/4";
pub const DEVICE_FACTORY_RESET: &str = "/3/0/5";
pub const DEVICE_POWER_SOURCES: &str = "/3/0/6";
pub const DEVICE_POWER_VOLTAGE: &str = "/3/0/7";
pub const DEVICE_POWER_CURRENT: &str = "/3/0/8";
pub const DEVICE_BATTERY_LEVEL: &str = "/3/0/9";
pub const DEVICE_MEMORY_FREE: &str = "/3/0/10";
pub const DEVICE_ERROR_CODE: &str = "/3/0/11";
pub const DEVICE_CURRENT_TIME: &str = "/3/0/13";
pub const DEVICE_UTC_OFFSET: &str = "/3/0/14";
pub const DEVICE_TIMEZONE: &str = "/3/0/15";
pub const DEVICE_SUPPORTED_BINDINGS: &str = "/3/0/16";
pub const DEVICE_TYPE: &str = "/3/0/17";
pub const DEVICE_HARDWARE_VERSION: &str = "/3/0/18";
pub const DEVICE_SOFTWARE_VERSION: &str = "/3/0/19";
pub const DEVICE_MEMORY_TOTAL: &str = "/3/0/21";

// Connectivity monitoring object (/4)
pub const CONN_MON_BEARER: &str = "/4/0/0";
pub const CONN_MON_AVAILABLE_BEARERS: &str = "/4/0/1";
pub const CONN_MON_RADIO_SIGNAL_STRENGTH: &str = "/4/0/2";
pub const CONN_MON_LINK_QUALITY: &str = "/4/0/3";
pub const CONN_MON_IP_ADDRESSES: &str = "/4/0/4";
pub const CONN_MON_ROUTER_IP_ADDRESSES: &str = "/4/0/5";
pub const CONN_MON_LINK_UTILIZATION: &str = "/4/0/6";
pub const CONN_MON_APN: &str = "/4/0/7";
pub const CONN_MON_CELL_ID: &str = "/4/0/8";
pub const CONN_MON_SMNC: &str = "/4/0/9";
pub const CONN_MON_SMCC: &str = "/4/0/10";

// Firmware update object (/5)
pub const FIRMWARE_PACKAGE: &str = "/5/0/0";
pub const FIRMWARE_PACKAGE_URI: &str = "/5/0/1";
pub const FIRMWARE_UPDATE: &str = "/5/0/2";
pub const FIRMWARE_STATE: &str = "/5/0/3";
pub const FIRMWARE_UPDATE_RESULT: &str = "/5/0/5";
pub const FIRMWARE_PKG_NAME: &str = "/5/0/6";
pub const FIRMWARE_PKG_VERSION: &str = "/5/0/7";

/// Check that `uri` is a non-empty path that fits the engine's URI field.
pub fn validate(uri: &str) -> Result<()> {
    if uri.is_empty() {
        return Err(Lwm2mError::InvalidArgument("uri is required".to_string()));
    }
    if !uri.starts_with('/') {
        return Err(Lwm2mError::InvalidArgument(format!(
            "uri must be an absolute path: {uri}"
        )));
    }
    if uri.len() > MAX_URI_LEN {
        return Err(Lwm2mError::InvalidArgument(format!(
            "uri longer than {MAX_URI_LEN} bytes: {uri}"
        )));
    }
    Ok(())
}
