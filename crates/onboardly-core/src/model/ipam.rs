// ── IPAM domain types ──

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::CustomFields;
use super::record_id::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpFamily {
    V4,
    V6,
}

/// A host address together with the prefix length of its subnet
/// (e.g. `192.0.2.10/24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceAddress {
    ip: IpAddr,
    prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAddress {
    #[error("invalid IP address '{0}'")]
    Address(String),
    #[error("invalid prefix length '{0}'")]
    PrefixSyntax(String),
    #[error("prefix length {prefix_len} out of range for {ip}")]
    PrefixRange { ip: IpAddr, prefix_len: u8 },
}

impl InterfaceAddress {
    pub fn new(ip: IpAddr, prefix_len: u8) -> Result<Self, InvalidAddress> {
        let max = match ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(InvalidAddress::PrefixRange { ip, prefix_len });
        }
        Ok(Self { ip, prefix_len })
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn family(&self) -> IpFamily {
        match self.ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

impl FromStr for InterfaceAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| InvalidAddress::PrefixSyntax(s.to_owned()))?;
        let ip: IpAddr = addr
            .trim()
            .parse()
            .map_err(|_| InvalidAddress::Address(addr.to_owned()))?;
        let prefix_len: u8 = len
            .trim()
            .parse()
            .map_err(|_| InvalidAddress::PrefixSyntax(len.to_owned()))?;
        Self::new(ip, prefix_len)
    }
}

impl TryFrom<String> for InterfaceAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InterfaceAddress> for String {
    fn from(a: InterfaceAddress) -> Self {
        a.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: RecordId,
    pub address: InterfaceAddress,
    pub status: String,
    /// Interface this address is assigned to, if any.
    pub assigned_interface: Option<RecordId>,
    pub custom_fields: CustomFields,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}
