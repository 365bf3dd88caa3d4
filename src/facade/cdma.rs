//! `org.freedesktop.ModemManager1.Modem.ModemCdma` — out of scope (spec
//! §1); this bridge only ever talks to GSM/UMTS/LTE/NR oFono modems.

#[derive(Debug, Default)]
pub struct ModemCdma;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.ModemCdma")]
impl ModemCdma {
    #[zbus(property, name = "Meid")]
    async fn meid(&self) -> String {
        String::new()
    }

    #[zbus(property, name = "Esn")]
    async fn esn(&self) -> String {
        String::new()
    }

    #[zbus(property, name = "Sid")]
    async fn sid(&self) -> u32 {
        0
    }

    #[zbus(property, name = "Nid")]
    async fn nid(&self) -> u32 {
        0
    }

    #[zbus(property, name = "Cdma1xRegistrationState")]
    async fn cdma1x_registration_state(&self) -> u32 {
        0
    }

    #[zbus(property, name = "EvdoRegistrationState")]
    async fn evdo_registration_state(&self) -> u32 {
        0
    }

    async fn activate(&self, _carrier_code: &str) -> zbus::fdo::Result<()> {
        Err(zbus::fdo::Error::NotSupported("CDMA activation is not implemented by this bridge".into()))
    }
}
