//! Object container handed to the protocol engine at start.

use tracing::{debug, warn};

use super::{
    BoundedString, ConnectivityObject, DeviceObject, FirmwareObject, ManagementObject,
    ObjectContent,
};
use crate::config::ClientConfig;
use crate::error::Result;

/// Security/server object built from the connect configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerObject {
    /// LWM2M server URI
    pub server_uri: BoundedString,
    /// Endpoint client name
    pub client_name: BoundedString,
    /// PSK identity (empty when not using PSK)
    pub psk_identity: BoundedString,
    /// PSK key (empty when not using PSK)
    pub psk_key: BoundedString,
    /// Registration lifetime in seconds
    pub lifetime: u32,
    /// Short server ID
    pub server_id: u16,
}

/// Object model snapshot a session registers with the engine.
///
/// Holds at most one object per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectContainer {
    /// Server object
    pub server: ServerObject,
    /// Device object (`/3`)
    pub device: Option<DeviceObject>,
    /// Firmware object (`/5`)
    pub firmware: Option<FirmwareObject>,
    /// Connectivity monitoring object (`/4`)
    pub monitoring: Option<ConnectivityObject>,
}

impl ObjectContainer {
    /// Build the container for a connect call.
    ///
    /// PSK credentials are copied only when both identity and key are set.
    /// A later object of an already-present kind replaces the earlier one.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut server = ServerObject {
            server_uri: BoundedString::try_copy(&config.server_uri)?,
            client_name: BoundedString::try_copy(&config.client_name)?,
            lifetime: config.lifetime,
            server_id: config.server_id,
            ..Default::default()
        };

        if let Some(psk) = &config.psk {
            if psk.identity.is_empty() || psk.key.is_empty() {
                warn!("Incomplete PSK parameters, connecting without PSK");
            } else {
                debug!("Copy PSK parameters (identity {})", psk.identity);
                server.psk_identity = BoundedString::try_copy(&psk.identity)?;
                server.psk_key = BoundedString::try_copy(&psk.key)?;
            }
        }

        let mut container = Self {
            server,
            ..Default::default()
        };

        for object in &config.objects {
            container.insert(object);
        }

        Ok(container)
    }

    /// Copy an object into its slot.
    pub fn insert(&mut self, object: &ManagementObject) {
        let replaced = match object.content() {
            ObjectContent::Device(dev) => self.device.replace(dev.clone()).is_some(),
            ObjectContent::Firmware(fw) => self.firmware.replace(fw.clone()).is_some(),
            ObjectContent::ConnectivityMonitoring(conn) => {
                self.monitoring.replace(conn.clone()).is_some()
            },
        };

        if replaced {
            warn!("Duplicate {} object, keeping the last one", object.kind());
        }
    }

    /// Check whether PSK security is configured
    pub fn uses_psk(&self) -> bool {
        !self.server.psk_identity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PskConfig;
    use crate::object::{DeviceParams, FirmwareParams};

    #[test]
    fn test_container_from_config() {
        let device = ManagementObject::device(DeviceParams {
            manufacturer: Some("Samsung"),
            ..Default::default()
        })
        .unwrap();

        let config = ClientConfig::new("coap://host:5683", "dev1")
            .with_lifetime(60)
            .with_server_id(7)
            .with_object(device);

        let container = ObjectContainer::from_config(&config).unwrap();
        assert_eq!(container.server.server_uri.as_str(), "coap://host:5683");
        assert_eq!(container.server.client_name.as_str(), "dev1");
        assert_eq!(container.server.lifetime, 60);
        assert_eq!(container.server.server_id, 7);
        assert!(container.device.is_some());
        assert!(container.firmware.is_none());
        assert!(!container.uses_psk());
    }

    #[test]
    fn test_incomplete_psk_ignored() {
        let mut config = ClientConfig::new("coaps://host:5684", "dev1");
        config.psk = Some(PskConfig {
            identity: "id".into(),
            key: String::new(),
        });
        let container = ObjectContainer::from_config(&config).unwrap();
        assert!(!container.uses_psk());
    }

    #[test]
    fn test_psk_copied() {
        let config = ClientConfig::new("coaps://host:5684", "dev1").with_psk("id", "secret");
        let container = ObjectContainer::from_config(&config).unwrap();
        assert!(container.uses_psk());
        assert_eq!(container.server.psk_key.as_str(), "secret");
    }

    #[test]
    fn test_duplicate_kind_keeps_last() {
        let first = ManagementObject::firmware(FirmwareParams {
            pkg_version: Some("1.0"),
            ..Default::default()
        })
        .unwrap();
        let second = ManagementObject::firmware(FirmwareParams {
            pkg_version: Some("2.0"),
            ..Default::default()
        })
        .unwrap();

        let mut container = ObjectContainer::default();
        container.insert(&first);
        container.insert(&second);
        assert_eq!(
            container.firmware.unwrap().pkg_version.as_str(),
            "2.0"
        );
    }
}
