//! `org.freedesktop.ModemManager1.Modem.Oma` — out of scope (spec §1);
//! OMA device management isn't reachable through any oFono interface this
//! bridge consumes.

#[derive(Debug, Default)]
pub struct Oma;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Oma")]
impl Oma {
    #[zbus(property, name = "Features")]
    async fn features(&self) -> u32 {
        0
    }

    #[zbus(property, name = "PendingNetworkInitiatedSessions")]
    async fn pending_network_initiated_sessions(&self) -> Vec<(u32, u32)> {
        Vec::new()
    }

    #[zbus(property, name = "SessionType")]
    async fn session_type(&self) -> u32 {
        0
    }

    #[zbus(property, name = "SessionState")]
    async fn session_state(&self) -> i32 {
        0
    }

    async fn start_client_initiated_session(&self, _session_type: u32) -> zbus::fdo::Result<()> {
        Err(zbus::fdo::Error::NotSupported("OMA device management is not implemented by this bridge".into()))
    }

    async fn accept_network_initiated_session(&self, _session_id: u32, _accept: bool) -> zbus::fdo::Result<()> {
        Err(zbus::fdo::Error::NotSupported("OMA device management is not implemented by this bridge".into()))
    }

    async fn cancel_session(&self) -> zbus::fdo::Result<()> {
        Ok(())
    }
}
