//! Wire-level enumerations and translation tables for the
//! `org.freedesktop.ModemManager1` API surface, and the oFono string
//! constants that map onto them.
//!
//! Properties exported over D-Bus carry the raw integer values documented
//! here (zbus serializes these as plain `i32`/`u32`); the tagged enums exist
//! purely so the rest of the crate never juggles bare integers.

use std::fmt;

/// `MMModemState` (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ModemState {
    Failed = -1,
    Unknown = 0,
    Initializing = 1,
    Locked = 2,
    Disabled = 3,
    Disabling = 4,
    Enabling = 5,
    Enabled = 6,
    Searching = 7,
    Registered = 8,
    Disconnecting = 9,
    Connecting = 10,
    Connected = 11,
}

impl ModemState {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ModemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModemState::Failed => "Failed",
            ModemState::Unknown => "Unknown",
            ModemState::Initializing => "Initializing",
            ModemState::Locked => "Locked",
            ModemState::Disabled => "Disabled",
            ModemState::Disabling => "Disabling",
            ModemState::Enabling => "Enabling",
            ModemState::Enabled => "Enabled",
            ModemState::Searching => "Searching",
            ModemState::Registered => "Registered",
            ModemState::Disconnecting => "Disconnecting",
            ModemState::Connecting => "Connecting",
            ModemState::Connected => "Connected",
        };
        f.write_str(s)
    }
}

/// `MMModemStateFailedReason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StateFailedReason {
    None = 0,
    Unknown = 1,
    SimMissing = 2,
    SimError = 3,
    UnknownCapabilities = 4,
    EsimWithoutProfiles = 5,
}

/// `MMModemLock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Lock {
    Unknown = 0,
    None = 1,
    SimPin = 2,
    SimPin2 = 3,
    SimPuk = 4,
    SimPuk2 = 5,
    PhSpPin = 6,
    PhSpPuk = 7,
    PhNetPin = 8,
    PhNetPuk = 9,
    PhSimPin = 10,
    PhCorpPin = 11,
    PhCorpPuk = 12,
    PhFsimPin = 13,
    PhFsimPuk = 14,
    PhNetsubPin = 15,
    PhNetsubPuk = 16,
}

/// oFono `SimManager.Retries` key → `MMModemLock` (spec §4.3).
pub fn ofono_retry_lock(key: &str) -> Option<Lock> {
    Some(match key {
        "pin" => Lock::SimPin,
        "pin2" => Lock::SimPin2,
        "puk" => Lock::SimPuk,
        "puk2" => Lock::SimPuk2,
        "service" => Lock::PhSpPin,
        "servicepuk" => Lock::PhSpPuk,
        "network" => Lock::PhNetPin,
        "networkpuk" => Lock::PhNetPuk,
        "corp" => Lock::PhCorpPin,
        "corppuk" => Lock::PhCorpPuk,
        "netsub" => Lock::PhNetsubPin,
        "netsubpuk" => Lock::PhNetsubPuk,
        _ => return None,
    })
}

/// `MMModemAccessTechnology` bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AccessTechnology {
    Unknown = 0,
    Pots = 1 << 0,
    Gsm = 1 << 1,
    GsmCompact = 1 << 2,
    Gprs = 1 << 3,
    Edge = 1 << 4,
    Umts = 1 << 5,
    Hsdpa = 1 << 6,
    Hsupa = 1 << 7,
    Hspa = 1 << 8,
    HspaPlus = 1 << 9,
    OneXrtt = 1 << 10,
    Evdo0 = 1 << 11,
    EvdoA = 1 << 12,
    EvdoB = 1 << 13,
    Lte = 1 << 14,
    FiveGNr = 1 << 15,
    LteCatM = 1 << 16,
    LteNbIot = 1 << 17,
}
pub const ACCESS_TECHNOLOGY_ANY: u32 = 0xFFFF_FFFF;

/// `MMModemCellType`, tracked in parallel with `AccessTechnology` (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CellType {
    Unknown = 0,
    Cdma = 1,
    Gsm = 2,
    Umts = 3,
    Tdscdma = 4,
    Lte = 5,
    FiveGNr = 6,
}

/// oFono `NetworkRegistration.Technology` → (`AccessTechnology`, `CellType`).
pub fn ofono_technology(tech: &str) -> Option<(AccessTechnology, CellType)> {
    Some(match tech {
        "nr" => (AccessTechnology::FiveGNr, CellType::FiveGNr),
        "lte" => (AccessTechnology::Lte, CellType::Lte),
        "hspa" => (AccessTechnology::Hspa, CellType::Umts),
        "hsupa" => (AccessTechnology::Hsupa, CellType::Umts),
        "hsdpa" => (AccessTechnology::Hsdpa, CellType::Umts),
        "umts" => (AccessTechnology::Umts, CellType::Umts),
        "edge" => (AccessTechnology::Gsm, CellType::Gsm),
        "gprs" => (AccessTechnology::Gsm, CellType::Gsm),
        "gsm" => (AccessTechnology::Gsm, CellType::Gsm),
        _ => return None,
    })
}

/// `MMModemMode` bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Mode {
    None = 0,
    Cs = 1 << 0,
    TwoG = 1 << 1,
    ThreeG = 1 << 2,
    FourG = 1 << 3,
    FiveG = 1 << 4,
}
pub const MODE_ANY: u32 = 0xFFFF_FFFF;

/// `MMModemCapability` bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Capability {
    None = 0,
    Pots = 1 << 0,
    CdmaEvdo = 1 << 1,
    GsmUmts = 1 << 2,
    Lte = 1 << 3,
    Iridium = 1 << 5,
    FiveGNr = 1 << 6,
    Tds = 1 << 7,
}
pub const CAPABILITY_ANY: u32 = 0xFFFF_FFFF;

/// oFono `RadioSettings.AvailableTechnologies`/`TechnologyPreference` entry →
/// `MMModemMode` bit (spec §4.3, "SupportedModes / CurrentModes").
pub fn ofono_mode(tech: &str) -> Option<u32> {
    Some(match tech {
        "gsm" => Mode::TwoG as u32,
        "umts" => Mode::ThreeG as u32,
        "lte" => Mode::FourG as u32,
        "nr" => Mode::FiveG as u32,
        _ => return None,
    })
}

/// Inverse of [`ofono_mode`]: the oFono technology string whose mode bit is
/// exactly `mode`. Used by `SetCurrentModes` to pick a `TechnologyPreference`.
pub fn mode_to_ofono(mode: u32) -> Option<&'static str> {
    Some(match mode {
        x if x == Mode::TwoG as u32 => "gsm",
        x if x == Mode::ThreeG as u32 => "umts",
        x if x == Mode::FourG as u32 => "lte",
        x if x == Mode::FiveG as u32 => "nr",
        _ => return None,
    })
}

/// oFono `RadioSettings.AvailableTechnologies` entry → `MMModemCapability` bit.
pub fn ofono_capability(tech: &str) -> Option<u32> {
    Some(match tech {
        "gsm" => Capability::GsmUmts as u32,
        "umts" => Capability::GsmUmts as u32,
        "lte" => Capability::Lte as u32,
        "nr" => Capability::FiveGNr as u32,
        _ => return None,
    })
}

/// One row of the `SupportedModes` table: `(allowed-mask, preferred)`.
pub type ModeRow = (u32, u32);

/// The fixed `SupportedModes` table, keyed by the OR of available
/// `MMModemMode` bits (spec §6, "Mode table").
pub fn supported_modes_for(mm_modes: u32) -> Vec<ModeRow> {
    use Mode::*;
    let (g2, g3, g4, g5) = (TwoG as u32, ThreeG as u32, FourG as u32, FiveG as u32);
    let any = MODE_ANY;

    match mm_modes {
        x if x == g2 | g3 | g4 | g5 => vec![
            (g2 | g3 | g4 | g5, g5),
            (g2 | g3 | g4, g4),
            (g2 | g3, g3),
            (g2, any),
        ],
        x if x == g3 | g4 | g5 => vec![(g3 | g4 | g5, any)],
        x if x == g2 | g4 | g5 => vec![(g2 | g4 | g5, any)],
        x if x == g4 | g5 => vec![(g4 | g5, any)],
        x if x == g3 | g5 => vec![(g3 | g5, any)],
        x if x == g2 | g5 => vec![(g2 | g5, any)],
        x if x == g5 => vec![(g5, any)],
        x if x == g2 | g3 | g4 => vec![(g2 | g3 | g4, g4), (g2 | g3, g3), (g2, any)],
        x if x == g3 | g4 => vec![(g3 | g4, g4), (g3, any)],
        x if x == g2 | g4 => vec![(g2 | g4, g4), (g2, any)],
        x if x == g3 => vec![(g3, any)],
        x if x == g2 => vec![(g2, any)],
        _ => vec![],
    }
}

/// `MMModemPortType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PortType {
    Unknown = 0,
    Net = 1,
    At = 2,
    Qcdm = 3,
    Gps = 4,
    Qmi = 5,
    Mbim = 6,
}

/// `MMBearerIpMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IpMethod {
    Unknown = 0,
    Ppp = 1,
    Static = 2,
    Dhcp = 3,
}

/// oFono `ConnectionContext.Settings.Method` → `MMBearerIpMethod` (spec §4.4).
pub fn ofono_ip_method(method: &str) -> IpMethod {
    match method {
        "static" => IpMethod::Static,
        "dhcp" => IpMethod::Dhcp,
        _ => IpMethod::Unknown,
    }
}

/// `MMBearerAllowedAuth`, restricted to the values spec §4.4 assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AllowedAuth {
    Unknown = 0,
    None = 1,
    Pap = 2,
    Chap = 3,
}

pub fn ofono_auth_method(method: &str) -> AllowedAuth {
    match method {
        "none" => AllowedAuth::None,
        "pap" => AllowedAuth::Pap,
        "chap" => AllowedAuth::Chap,
        _ => AllowedAuth::Unknown,
    }
}

/// `MMBearerRoamingAllowance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RoamingAllowance {
    None = 0,
    Partner = 2,
}

pub fn roaming_allowance(roaming_allowed: bool) -> RoamingAllowance {
    if roaming_allowed {
        RoamingAllowance::Partner
    } else {
        RoamingAllowance::None
    }
}

/// `MMBearerProfileSource`, only the `Unknown` member is ever produced here.
pub const BEARER_PROFILE_SOURCE_UNKNOWN: u32 = 0;
/// `MMBearerApnType`, only `DEFAULT` is ever produced here (spec §4.4).
pub const BEARER_APN_TYPE_DEFAULT: u32 = 2;
/// `MMBearerIpFamily`, only `IPV4` is ever produced here (spec §4.4).
pub const BEARER_IP_FAMILY_IPV4: u32 = 1;
/// `MMModemPowerState` values used by projection/`SetPowerState`.
pub const POWER_STATE_OFF: u32 = 1;
pub const POWER_STATE_ON: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_table_full_stack_has_five_g_preferred_first() {
        let rows = supported_modes_for(Mode::TwoG as u32 | Mode::ThreeG as u32 | Mode::FourG as u32 | Mode::FiveG as u32);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].1, Mode::FiveG as u32);
        assert_eq!(rows.last().unwrap().1, MODE_ANY);
    }

    #[test]
    fn mode_table_empty_for_none() {
        assert!(supported_modes_for(Mode::None as u32).is_empty());
    }

    #[test]
    fn technology_mapping_groups_hspa_family_under_umts_cell_type() {
        for tech in ["hspa", "hsupa", "hsdpa", "umts"] {
            let (_, cell) = ofono_technology(tech).unwrap();
            assert_eq!(cell, CellType::Umts);
        }
    }

    #[test]
    fn retry_lock_mapping_covers_every_documented_key() {
        for key in [
            "pin", "pin2", "puk", "puk2", "service", "servicepuk", "network", "networkpuk",
            "corp", "corppuk", "netsub", "netsubpuk",
        ] {
            assert!(ofono_retry_lock(key).is_some(), "missing mapping for {key}");
        }
        assert!(ofono_retry_lock("bogus").is_none());
    }

    #[test]
    fn mode_round_trips_through_ofono_string() {
        for tech in ["gsm", "umts", "lte", "nr"] {
            let bit = ofono_mode(tech).unwrap();
            assert_eq!(mode_to_ofono(bit), Some(tech));
        }
    }
}
