//! Network model: zones, fabrics, VLANs, subnets and spaces.

use entity_sync_core::envelope::{Envelope, EnvelopeBuilder};
use entity_sync_macros::Entity;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Availability zone
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Zone name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Layer 2 fabric grouping VLANs
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fabric {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Fabric name
    pub name: String,
    /// Optional class label
    pub class_type: Option<String>,
    /// VLANs on this fabric
    #[serde(default)]
    pub vlan_ids: Vec<u32>,
}

/// VLAN on a fabric.
///
/// DHCP configuration failures are reported per VLAN, so errors are also kept
/// per item.
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(event_errors, status(configureDHCP = "configuringDHCP"))]
pub struct Vlan {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// 802.1Q tag
    pub vid: u16,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Owning fabric
    pub fabric: u32,
    /// Owning space
    pub space: Option<u32>,
    /// MTU
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    /// Whether MAAS serves DHCP on this VLAN
    #[serde(default)]
    pub dhcp_on: bool,
}

const fn default_mtu() -> u32 {
    1500
}

/// IP subnet
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(event_errors)]
pub struct Subnet {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Display name
    pub name: String,
    /// Network in CIDR notation
    pub cidr: String,
    /// Owning VLAN
    pub vlan: u32,
    /// Default gateway
    pub gateway_ip: Option<String>,
    /// DNS servers handed out on this subnet
    #[serde(default)]
    pub dns_servers: Vec<String>,
    /// Whether MAAS manages allocation
    #[serde(default)]
    pub managed: bool,
}

/// Network space
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Space name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Subnets in this space
    #[serde(default)]
    pub subnet_ids: Vec<u32>,
    /// VLANs in this space
    #[serde(default)]
    pub vlan_ids: Vec<u32>,
}

/// Configure DHCP on a VLAN (`vlan.configure_dhcp`).
///
/// `options` carries the controllers and extra settings; the VLAN id is added
/// here so the request is tracked against that VLAN.
#[must_use]
pub fn configure_dhcp(id: u32, options: Value) -> Envelope {
    let mut params = json!({ "id": id });
    if let (Value::Object(params), Value::Object(options)) = (&mut params, options) {
        params.extend(options);
    }
    EnvelopeBuilder::<Vlan>::new().custom_method("configureDHCP", "configure_dhcp", Some(params))
}
