//! `org.freedesktop.ModemManager1.Modem.Voice`, grounded on
//! `mm_call.py`. `CallState::Terminated` is kept distinct from `Active`
//! (spec §9, open question: the source conflated "disconnected"/"active"
//! onto the same numeric value 4; a terminated call is 7).

use std::collections::HashMap;
use tokio::sync::Mutex;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

/// `MMCallState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CallState {
    Unknown = 0,
    Dialing = 1,
    RingingOut = 2,
    RingingIn = 3,
    Active = 4,
    Held = 5,
    Waiting = 6,
    Terminated = 7,
}

#[derive(Debug, Default)]
pub struct Voice {
    calls: Mutex<HashMap<OwnedObjectPath, CallState>>,
}

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Voice")]
impl Voice {
    #[zbus(property, name = "Calls")]
    async fn calls(&self) -> Vec<OwnedObjectPath> {
        self.calls.lock().await.keys().cloned().collect()
    }

    #[zbus(property, name = "EmergencyOnly")]
    async fn emergency_only(&self) -> bool {
        false
    }

    async fn create_call(&self, _props: HashMap<String, OwnedValue>) -> zbus::fdo::Result<OwnedObjectPath> {
        Err(zbus::fdo::Error::NotSupported("voice calling is not implemented by this bridge".into()))
    }

    async fn delete_call(&self, path: OwnedObjectPath) -> zbus::fdo::Result<()> {
        self.calls.lock().await.remove(&path);
        Ok(())
    }

    async fn hangup_all(&self) -> zbus::fdo::Result<()> {
        for state in self.calls.lock().await.values_mut() {
            *state = CallState::Terminated;
        }
        Ok(())
    }
}
