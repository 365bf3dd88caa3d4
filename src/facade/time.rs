//! `org.freedesktop.ModemManager1.Modem.Time` — out of scope (spec §1);
//! network time is not derived from any oFono interface this bridge mirrors.

#[derive(Debug, Default)]
pub struct Time;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Time")]
impl Time {
    #[zbus(property, name = "NetworkTimezone")]
    async fn network_timezone(&self) -> std::collections::HashMap<String, zbus::zvariant::OwnedValue> {
        std::collections::HashMap::new()
    }

    async fn get_network_time(&self) -> zbus::fdo::Result<String> {
        Err(zbus::fdo::Error::NotSupported("network time is not implemented by this bridge".into()))
    }
}
