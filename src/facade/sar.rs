//! `org.freedesktop.ModemManager1.Modem.Sar` — out of scope (spec §1);
//! SAR power-backoff state isn't exposed by any oFono interface this
//! bridge consumes.

#[derive(Debug, Default)]
pub struct Sar;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Sar")]
impl Sar {
    #[zbus(property)]
    async fn state(&self) -> bool {
        false
    }

    async fn enable(&self, _enable: bool) -> zbus::fdo::Result<()> {
        Err(zbus::fdo::Error::NotSupported("SAR control is not implemented by this bridge".into()))
    }

    async fn set_power_level(&self, _level: u32) -> zbus::fdo::Result<()> {
        Err(zbus::fdo::Error::NotSupported("SAR control is not implemented by this bridge".into()))
    }
}
