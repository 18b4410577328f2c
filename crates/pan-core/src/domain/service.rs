//! PAN service roles.
//!
//! The Bluetooth PAN profile defines three roles, each identified by a 16-bit
//! service class id (also used as the BNEP service id) and the matching
//! 128-bit UUID:
//!
//! | Role | Id       | Meaning                                  |
//! |------|----------|------------------------------------------|
//! | PANU | `0x1115` | PAN user, the client side of a link      |
//! | NAP  | `0x1116` | Network access point, bridges to a LAN   |
//! | GN   | `0x1117` | Group ad-hoc network between PAN users   |
//!
//! Callers name a role with a label: the friendly name (`"nap"`), the UUID
//! string, or the hex id (`"1116"` / `"0x1116"`).  Only NAP and GN can be
//! requested from the manager; see [`ServiceRequestType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix shared by every Bluetooth base-UUID derived 128-bit UUID.
const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

/// Error returned when a service label cannot be turned into a request type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceParseError {
    /// The label does not name any PAN role.
    #[error("unknown PAN service {0:?}")]
    Unknown(String),
    /// The label names a PAN role the manager cannot serve or connect to.
    #[error("PAN service {0} is not supported")]
    Unsupported(PanRole),
}

/// One of the three PAN profile roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanRole {
    Panu,
    Nap,
    Gn,
}

impl PanRole {
    pub const ALL: [PanRole; 3] = [PanRole::Panu, PanRole::Nap, PanRole::Gn];

    /// 16-bit service class id.
    pub fn id(self) -> u16 {
        match self {
            PanRole::Panu => 0x1115,
            PanRole::Nap => 0x1116,
            PanRole::Gn => 0x1117,
        }
    }

    /// Friendly lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            PanRole::Panu => "panu",
            PanRole::Nap => "nap",
            PanRole::Gn => "gn",
        }
    }

    /// 128-bit UUID string, lower case.
    pub fn uuid128(self) -> String {
        format!("{:08x}{BASE_UUID_SUFFIX}", self.id())
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    /// Resolves a label.
    ///
    /// Tried in order: friendly name, 128-bit UUID, hex id.  Names and UUIDs
    /// are matched case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        if let Some(role) = Self::ALL
            .into_iter()
            .find(|role| label.eq_ignore_ascii_case(role.name()))
        {
            return Some(role);
        }

        if let Some(role) = Self::ALL
            .into_iter()
            .find(|role| label.eq_ignore_ascii_case(&role.uuid128()))
        {
            return Some(role);
        }

        let hex = label
            .strip_prefix("0x")
            .or_else(|| label.strip_prefix("0X"))
            .unwrap_or(label);
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u16::from_str_radix(hex, 16).ok().and_then(Self::from_id)
    }
}

impl fmt::Display for PanRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PanRole::Panu => "PANU",
            PanRole::Nap => "NAP",
            PanRole::Gn => "GN",
        })
    }
}

/// The service a server offers or a connection targets.
///
/// Only the two roles that accept incoming PAN users are valid here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceRequestType {
    /// Group ad-hoc network (GN).
    GroupNetwork,
    /// Network access point (NAP).
    NetworkAccessPoint,
}

impl ServiceRequestType {
    pub fn role(self) -> PanRole {
        match self {
            ServiceRequestType::GroupNetwork => PanRole::Gn,
            ServiceRequestType::NetworkAccessPoint => PanRole::Nap,
        }
    }

    pub fn id(self) -> u16 {
        self.role().id()
    }

    pub fn uuid128(self) -> String {
        self.role().uuid128()
    }
}

impl TryFrom<PanRole> for ServiceRequestType {
    type Error = ServiceParseError;

    fn try_from(role: PanRole) -> Result<Self, Self::Error> {
        match role {
            PanRole::Gn => Ok(ServiceRequestType::GroupNetwork),
            PanRole::Nap => Ok(ServiceRequestType::NetworkAccessPoint),
            PanRole::Panu => Err(ServiceParseError::Unsupported(role)),
        }
    }
}

impl FromStr for ServiceRequestType {
    type Err = ServiceParseError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let role =
            PanRole::from_label(label).ok_or_else(|| ServiceParseError::Unknown(label.to_string()))?;
        role.try_into()
    }
}

impl fmt::Display for ServiceRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.role().fmt(f)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids_match_service_class_ids() {
        assert_eq!(PanRole::Panu.id(), 0x1115);
        assert_eq!(PanRole::Nap.id(), 0x1116);
        assert_eq!(PanRole::Gn.id(), 0x1117);
    }

    #[test]
    fn test_uuid128_uses_bluetooth_base_uuid() {
        assert_eq!(
            PanRole::Nap.uuid128(),
            "00001116-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_from_label_accepts_friendly_names_case_insensitively() {
        assert_eq!(PanRole::from_label("nap"), Some(PanRole::Nap));
        assert_eq!(PanRole::from_label("NAP"), Some(PanRole::Nap));
        assert_eq!(PanRole::from_label("Gn"), Some(PanRole::Gn));
        assert_eq!(PanRole::from_label("panu"), Some(PanRole::Panu));
    }

    #[test]
    fn test_from_label_accepts_uuid_strings() {
        assert_eq!(
            PanRole::from_label("00001117-0000-1000-8000-00805F9B34FB"),
            Some(PanRole::Gn)
        );
    }

    #[test]
    fn test_from_label_accepts_hex_ids() {
        assert_eq!(PanRole::from_label("1116"), Some(PanRole::Nap));
        assert_eq!(PanRole::from_label("0x1117"), Some(PanRole::Gn));
    }

    #[test]
    fn test_from_label_rejects_out_of_range_and_garbage() {
        assert_eq!(PanRole::from_label("1118"), None);
        assert_eq!(PanRole::from_label("bogus"), None);
        assert_eq!(PanRole::from_label(""), None);
    }

    #[test]
    fn test_from_label_rejects_signed_hex() {
        assert_eq!(PanRole::from_label("+1116"), None);
        assert_eq!(PanRole::from_label("0x+1117"), None);
        assert_eq!(PanRole::from_label("0x"), None);
    }

    #[test]
    fn test_request_type_parses_supported_roles() {
        assert_eq!(
            "nap".parse::<ServiceRequestType>(),
            Ok(ServiceRequestType::NetworkAccessPoint)
        );
        assert_eq!(
            "GN".parse::<ServiceRequestType>(),
            Ok(ServiceRequestType::GroupNetwork)
        );
    }

    #[test]
    fn test_request_type_rejects_panu_as_unsupported() {
        assert_eq!(
            "panu".parse::<ServiceRequestType>(),
            Err(ServiceParseError::Unsupported(PanRole::Panu))
        );
    }

    #[test]
    fn test_request_type_rejects_unknown_label() {
        assert!(matches!(
            "wifi".parse::<ServiceRequestType>(),
            Err(ServiceParseError::Unknown(label)) if label == "wifi"
        ));
    }
}
