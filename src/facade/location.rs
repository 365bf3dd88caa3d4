//! `org.freedesktop.ModemManager1.Modem.Location` — the original drives
//! GeoClue for this; there is no idiomatic Rust equivalent wired up here,
//! so this is a genuine stub that reports no capabilities (spec §1).

use crate::mm_error::MmError;
use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

#[derive(Debug, Default)]
pub struct Location;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Location")]
impl Location {
    #[zbus(property)]
    async fn capabilities(&self) -> u32 {
        0
    }

    #[zbus(property, name = "SignalsLocation")]
    async fn signals_location(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn enabled(&self) -> u32 {
        0
    }

    #[zbus(property, name = "Location")]
    async fn location(&self) -> HashMap<u32, OwnedValue> {
        HashMap::new()
    }

    async fn setup(&self, _sources: u32, _signal_location: bool) -> zbus::fdo::Result<()> {
        Ok(())
    }

    async fn get_location(&self) -> zbus::fdo::Result<HashMap<u32, OwnedValue>> {
        Ok(HashMap::new())
    }

    #[zbus(name = "SetSuplServer")]
    async fn set_supl_server(&self, _supl: &str) -> Result<(), MmError> {
        Err(MmError::Unsupported("cannot set SUPL server: A-GPS not supported".to_string()))
    }

    #[zbus(name = "InjectAssistanceData")]
    async fn inject_assistance_data(&self, _data: Vec<u8>) -> Result<(), MmError> {
        Err(MmError::Unsupported("cannot inject assistance data: unsupported".to_string()))
    }
}
