//! Resource entity and its enumerations.
//!
//! # Responsibilities
//! - Represent a single VPN server or node
//! - Carry the hot field (`capacity_load`) alongside low-frequency fields
//! - Keep the load invariant (`0..=100`) in one place

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::SystemTime;

/// Upper bound of `capacity_load`.
pub const MAX_LOAD: u8 = 100;

/// Opaque, totally ordered resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Owning tenant. Used only as a scoping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Error returned when parsing one of the resource enumerations from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// VPN protocol served by a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    #[serde(alias = "open_vpn")]
    OpenVpn,
    #[serde(alias = "ikev")]
    Ikev2,
    WireGuard,
    ZeroTier,
}

impl ProtocolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolType::OpenVpn => "openvpn",
            ProtocolType::Ikev2 => "ikev2",
            ProtocolType::WireGuard => "wireguard",
            ProtocolType::ZeroTier => "zerotier",
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openvpn" | "open_vpn" => Ok(ProtocolType::OpenVpn),
            "ikev2" | "ikev" => Ok(ProtocolType::Ikev2),
            "wireguard" => Ok(ProtocolType::WireGuard),
            "zerotier" => Ok(ProtocolType::ZeroTier),
            _ => Err(ParseEnumError { kind: "protocol", value: s.to_string() }),
        }
    }
}

/// Whether the entry is a VPN server or a coordinating node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[default]
    Server,
    Node,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Server => f.write_str("server"),
            ResourceKind::Node => f.write_str("node"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(ResourceKind::Server),
            "node" => Ok(ResourceKind::Node),
            _ => Err(ParseEnumError { kind: "resource kind", value: s.to_string() }),
        }
    }
}

/// Operational status. Only `Online` resources are selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    #[default]
    Online,
    Maintenance,
    Offline,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Online => "online",
            ResourceStatus::Maintenance => "maintenance",
            ResourceStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" => Ok(ResourceStatus::Online),
            "maintenance" => Ok(ResourceStatus::Maintenance),
            "offline" => Ok(ResourceStatus::Offline),
            _ => Err(ParseEnumError { kind: "status", value: s.to_string() }),
        }
    }
}

/// Last known probe verdict. Informational; does not gate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// A VPN server or node eligible for user allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    pub protocol: ProtocolType,
    /// Free-form locality tag (country/city), matched exactly.
    pub region: String,
    /// Probe target.
    pub address: SocketAddr,
    /// Declared relative capacity, only read by the weighted strategy.
    pub weight: u32,
    /// Utilization in `0..=MAX_LOAD`.
    pub capacity_load: u8,
    pub status: ResourceStatus,
    pub health_status: HealthStatus,
    pub tenant_id: TenantId,
    pub connected_users: u32,
    pub last_health_check: Option<SystemTime>,
    /// Bumped by every store write; backs compare-and-set.
    pub version: u64,
}

impl Resource {
    /// Create an idle, online resource with unknown health.
    pub fn new(
        id: ResourceId,
        tenant_id: TenantId,
        protocol: ProtocolType,
        region: impl Into<String>,
        address: SocketAddr,
    ) -> Self {
        Self {
            name: id.to_string(),
            id,
            kind: ResourceKind::Server,
            protocol,
            region: region.into(),
            address,
            weight: 1,
            capacity_load: 0,
            status: ResourceStatus::Online,
            health_status: HealthStatus::Unknown,
            tenant_id,
            connected_users: 0,
            last_health_check: None,
            version: 0,
        }
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_load(mut self, load: u8) -> Self {
        self.capacity_load = load.min(MAX_LOAD);
        self
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == ResourceStatus::Online
    }

    /// Apply `delta` to the load, clamped to `0..=MAX_LOAD`.
    ///
    /// Returns the delta that was actually applied, which `connected_users`
    /// follows.
    pub fn apply_load_delta(&mut self, delta: i64) -> i64 {
        self.apply_load_delta_within(delta, 0, MAX_LOAD)
    }

    /// Like [`Resource::apply_load_delta`] with a narrower `[min, max]` window.
    pub fn apply_load_delta_within(&mut self, delta: i64, min: u8, max: u8) -> i64 {
        let before = self.capacity_load;
        let target = (before as i64).saturating_add(delta).clamp(min as i64, max as i64);
        self.capacity_load = clamp_load(target);
        let applied = self.capacity_load as i64 - before as i64;
        self.connected_users = (self.connected_users as i64 + applied).max(0) as u32;
        applied
    }
}

/// Clamp an arbitrary integer into the valid load range.
pub fn clamp_load(value: i64) -> u8 {
    value.clamp(0, MAX_LOAD as i64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Resource {
        Resource::new(
            "a".into(),
            "t1".into(),
            ProtocolType::WireGuard,
            "de-fra",
            "127.0.0.1:51820".parse().unwrap(),
        )
    }

    #[test]
    fn test_load_delta_clamps() {
        let mut r = sample();
        assert_eq!(r.apply_load_delta(250), 100);
        assert_eq!(r.capacity_load, 100);
        assert_eq!(r.apply_load_delta(1), 0);
        assert_eq!(r.apply_load_delta(-1000), -100);
        assert_eq!(r.capacity_load, 0);
        assert_eq!(r.connected_users, 0);
    }

    #[test]
    fn test_extreme_deltas_saturate() {
        let mut r = sample().with_load(5);
        assert_eq!(r.apply_load_delta(i64::MAX), 95);
        assert_eq!(r.capacity_load, 100);
        assert_eq!(r.apply_load_delta(i64::MIN), -100);
        assert_eq!(r.capacity_load, 0);
    }

    #[test]
    fn test_connected_users_follow_effective_delta() {
        let mut r = sample().with_load(99);
        r.connected_users = 99;
        r.apply_load_delta(5);
        assert_eq!(r.capacity_load, 100);
        assert_eq!(r.connected_users, 100);
    }

    #[test]
    fn test_parse_protocol() {
        assert_eq!("WireGuard".parse::<ProtocolType>().unwrap(), ProtocolType::WireGuard);
        assert_eq!("ikev".parse::<ProtocolType>().unwrap(), ProtocolType::Ikev2);
        assert!("pptp".parse::<ProtocolType>().is_err());
    }

    #[test]
    fn test_protocol_serde_names() {
        let p: ProtocolType = serde_json::from_str("\"openvpn\"").unwrap();
        assert_eq!(p, ProtocolType::OpenVpn);
        assert_eq!(serde_json::to_string(&ProtocolType::ZeroTier).unwrap(), "\"zerotier\"");
    }
}
