//! Management object builder.
//!
//! Builds the typed objects a session registers with the protocol engine at
//! start: Device (`/3`), Connectivity Monitoring (`/4`) and Firmware (`/5`).
//!
//! # Field Layout
//!
//! Each object is a fixed-layout record. Text fields are [`BoundedString`]s
//! (truncated to [`MAX_STR_LEN`] bytes on copy, no error); integer fields are
//! copied verbatim without range checks.
//!
//! # Ownership
//!
//! A [`ManagementObject`] belongs to the caller until it is passed to
//! connect, which clones its content into the session's object container.
//! Releasing is a plain drop, or [`ManagementObject::free`] on an optional
//! slot, which is a no-op when the slot is already empty.
//!
//! ```rust,ignore
//! use lwm2m::object::{DeviceParams, ManagementObject};
//!
//! let mut device = Some(ManagementObject::device(DeviceParams {
//!     manufacturer: Some("Samsung"),
//!     model_number: Some("ARTIK 530"),
//!     ..Default::default()
//! })?);
//!
//! ManagementObject::free(&mut device);
//! ManagementObject::free(&mut device); // no-op
//! ```

mod bounded;
mod container;

pub use bounded::{BoundedString, MAX_STR_LEN};
pub use container::{ObjectContainer, ServerObject};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Object kinds a session can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Device object (`/3`)
    Device,
    /// Firmware update object (`/5`)
    Firmware,
    /// Connectivity monitoring object (`/4`)
    ConnectivityMonitoring,
}

impl ObjectKind {
    /// LWM2M object ID
    pub fn object_id(&self) -> u16 {
        match self {
            ObjectKind::Device => 3,
            ObjectKind::ConnectivityMonitoring => 4,
            ObjectKind::Firmware => 5,
        }
    }

    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Device => "device",
            ObjectKind::Firmware => "firmware",
            ObjectKind::ConnectivityMonitoring => "connectivity_monitoring",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Device object content
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceObject {
    pub manufacturer: BoundedString,
    pub model_number: BoundedString,
    pub serial_number: BoundedString,
    pub firmware_version: BoundedString,
    pub hardware_version: BoundedString,
    pub software_version: BoundedString,
    pub device_type: BoundedString,
    pub power_source: i32,
    pub power_voltage: i32,
    pub power_current: i32,
    pub battery_level: i32,
    pub memory_total: i32,
    pub memory_free: i32,
    pub time_zone: BoundedString,
    pub utc_offset: BoundedString,
    pub binding_mode: BoundedString,
}

/// Firmware update object content
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareObject {
    /// Whether the device accepts firmware updates
    pub supported: bool,
    pub pkg_name: BoundedString,
    pub pkg_version: BoundedString,
}

/// Connectivity monitoring object content
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityObject {
    pub network_bearer: i32,
    pub available_network_bearer: i32,
    pub radio_signal_strength: i32,
    pub link_quality: i32,
    pub ip_addr: BoundedString,
    pub ip_addr2: BoundedString,
    pub router_ip_addr: BoundedString,
    pub router_ip_addr2: BoundedString,
    pub link_utilization: i32,
    pub apn: BoundedString,
    pub cell_id: i32,
    pub smnc: i32,
    pub smcc: i32,
}

#[allow(missing_docs)]
mod params {
    /// Input fields for [`super::ManagementObject::device`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DeviceParams<'a> {
        pub manufacturer: Option<&'a str>,
        pub model_number: Option<&'a str>,
        pub serial_number: Option<&'a str>,
        pub firmware_version: Option<&'a str>,
        pub hardware_version: Option<&'a str>,
        pub software_version: Option<&'a str>,
        pub device_type: Option<&'a str>,
        pub power_source: i32,
        pub power_voltage: i32,
        pub power_current: i32,
        pub battery_level: i32,
        pub memory_total: i32,
        pub memory_free: i32,
        pub time_zone: Option<&'a str>,
        pub utc_offset: Option<&'a str>,
        pub binding_mode: Option<&'a str>,
    }

    /// Input fields for [`super::ManagementObject::firmware`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FirmwareParams<'a> {
        pub supported: bool,
        pub pkg_name: Option<&'a str>,
        pub pkg_version: Option<&'a str>,
    }

    /// Input fields for [`super::ManagementObject::connectivity_monitoring`].
    ///
    /// Only the first two entries of each address list are kept.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ConnectivityParams<'a> {
        pub network_bearer: i32,
        pub available_network_bearer: i32,
        pub radio_signal_strength: i32,
        pub link_quality: i32,
        pub ip_addresses: &'a [&'a str],
        pub router_ip_addresses: &'a [&'a str],
        pub link_utilization: i32,
        pub apn: Option<&'a str>,
        pub cell_id: i32,
        pub smnc: i32,
        pub smcc: i32,
    }
}

pub use params::{ConnectivityParams, DeviceParams, FirmwareParams};

/// Type-specific object record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectContent {
    /// Device record
    Device(DeviceObject),
    /// Firmware record
    Firmware(FirmwareObject),
    /// Connectivity monitoring record
    ConnectivityMonitoring(ConnectivityObject),
}

/// A typed management object handed to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagementObject {
    content: ObjectContent,
}

impl ManagementObject {
    /// Build a Device object.
    pub fn device(p: DeviceParams<'_>) -> Result<Self> {
        debug!("Creating device object");

        let content = DeviceObject {
            manufacturer: BoundedString::try_copy_opt(p.manufacturer)?,
            model_number: BoundedString::try_copy_opt(p.model_number)?,
            serial_number: BoundedString::try_copy_opt(p.serial_number)?,
            firmware_version: BoundedString::try_copy_opt(p.firmware_version)?,
            hardware_version: BoundedString::try_copy_opt(p.hardware_version)?,
            software_version: BoundedString::try_copy_opt(p.software_version)?,
            device_type: BoundedString::try_copy_opt(p.device_type)?,
            power_source: p.power_source,
            power_voltage: p.power_voltage,
            power_current: p.power_current,
            battery_level: p.battery_level,
            memory_total: p.memory_total,
            memory_free: p.memory_free,
            time_zone: BoundedString::try_copy_opt(p.time_zone)?,
            utc_offset: BoundedString::try_copy_opt(p.utc_offset)?,
            binding_mode: BoundedString::try_copy_opt(p.binding_mode)?,
        };

        Ok(Self {
            content: ObjectContent::Device(content),
        })
    }

    /// Build a Firmware object.
    pub fn firmware(p: FirmwareParams<'_>) -> Result<Self> {
        debug!("Creating firmware object");

        let content = FirmwareObject {
            supported: p.supported,
            pkg_name: BoundedString::try_copy_opt(p.pkg_name)?,
            pkg_version: BoundedString::try_copy_opt(p.pkg_version)?,
        };

        Ok(Self {
            content: ObjectContent::Firmware(content),
        })
    }

    /// Build a Connectivity Monitoring object.
    pub fn connectivity_monitoring(p: ConnectivityParams<'_>) -> Result<Self> {
        debug!("Creating connectivity monitoring object");

        let nth = |list: &[&str], i: usize| BoundedString::try_copy_opt(list.get(i).copied());

        let content = ConnectivityObject {
            network_bearer: p.network_bearer,
            available_network_bearer: p.available_network_bearer,
            radio_signal_strength: p.radio_signal_strength,
            link_quality: p.link_quality,
            ip_addr: nth(p.ip_addresses, 0)?,
            ip_addr2: nth(p.ip_addresses, 1)?,
            router_ip_addr: nth(p.router_ip_addresses, 0)?,
            router_ip_addr2: nth(p.router_ip_addresses, 1)?,
            link_utilization: p.link_utilization,
            apn: BoundedString::try_copy_opt(p.apn)?,
            cell_id: p.cell_id,
            smnc: p.smnc,
            smcc: p.smcc,
        };

        Ok(Self {
            content: ObjectContent::ConnectivityMonitoring(content),
        })
    }

    /// Release an object held in an optional slot.
    ///
    /// Empty slots are left alone, so calling this twice is harmless.
    pub fn free(slot: &mut Option<ManagementObject>) {
        if let Some(obj) = slot.take() {
            debug!("Freeing {} object", obj.kind());
        }
    }

    /// Object kind
    pub fn kind(&self) -> ObjectKind {
        match self.content {
            ObjectContent::Device(_) => ObjectKind::Device,
            ObjectContent::Firmware(_) => ObjectKind::Firmware,
            ObjectContent::ConnectivityMonitoring(_) => ObjectKind::ConnectivityMonitoring,
        }
    }

    /// Object record
    pub fn content(&self) -> &ObjectContent {
        &self.content
    }
}
