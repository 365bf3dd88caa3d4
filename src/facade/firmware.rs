//! `org.freedesktop.ModemManager1.Modem.Firmware` — out of scope (spec §1);
//! no `mm_modem_firmware.py` source was available to ground this against,
//! so it is kept to the minimal shape the ModemManager API documents: no
//! installed firmware slots, nothing selectable.

use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

#[derive(Debug, Default)]
pub struct Firmware;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Firmware")]
impl Firmware {
    async fn list(&self) -> zbus::fdo::Result<(HashMap<String, OwnedValue>, Vec<HashMap<String, OwnedValue>>)> {
        Ok((HashMap::new(), Vec::new()))
    }

    async fn select(&self, _unique_id: &str) -> zbus::fdo::Result<()> {
        Err(zbus::fdo::Error::NotSupported("firmware selection is not implemented by this bridge".into()))
    }
}
