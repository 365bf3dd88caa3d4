//! `org.freedesktop.ModemManager1.Modem.Signal`, grounded on
//! `mm_modem_signal.py`'s use of `NetworkMonitor.GetServingCellInformation`.
//! Detailed per-RAT signal figures (rscp/ecio/rsrq/rsrp/snr) are out of
//! scope (spec §1); `Rate` and the technology sub-dicts are reported empty.

use crate::mm_error::MmError;
use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

#[derive(Debug, Default)]
pub struct Signal;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Signal")]
impl Signal {
    #[zbus(property)]
    async fn rate(&self) -> u32 {
        0
    }

    #[zbus(property, name = "RssiThreshold")]
    async fn rssi_threshold(&self) -> u32 {
        0
    }

    #[zbus(property, name = "ErrorRateThreshold")]
    async fn error_rate_threshold(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn gsm(&self) -> HashMap<String, OwnedValue> {
        HashMap::new()
    }

    #[zbus(property)]
    async fn umts(&self) -> HashMap<String, OwnedValue> {
        HashMap::new()
    }

    #[zbus(property)]
    async fn lte(&self) -> HashMap<String, OwnedValue> {
        HashMap::new()
    }

    #[zbus(property, name = "Nr5g")]
    async fn nr5g(&self) -> HashMap<String, OwnedValue> {
        HashMap::new()
    }

    async fn setup(&self, _rate: u32) -> zbus::fdo::Result<()> {
        Ok(())
    }

    #[zbus(name = "SetupThresholds")]
    async fn setup_thresholds(&self, _settings: HashMap<String, OwnedValue>) -> Result<(), MmError> {
        Err(MmError::Unsupported("cannot setup thresholds: operation not supported".to_string()))
    }
}
