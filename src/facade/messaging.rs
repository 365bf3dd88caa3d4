//! `org.freedesktop.ModemManager1.Modem.Messaging` — SMS is explicitly
//! out of scope (spec §1); this mirrors no state and answers with an empty
//! message list.

use std::collections::HashMap;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

#[derive(Debug, Default)]
pub struct Messaging;

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Messaging")]
impl Messaging {
    #[zbus(property, name = "Messages")]
    async fn messages(&self) -> Vec<OwnedObjectPath> {
        Vec::new()
    }

    #[zbus(property, name = "SupportedStorages")]
    async fn supported_storages(&self) -> Vec<u32> {
        Vec::new()
    }

    async fn create_message(&self, _props: HashMap<String, OwnedValue>) -> zbus::fdo::Result<OwnedObjectPath> {
        Err(zbus::fdo::Error::NotSupported("messaging is not implemented by this bridge".into()))
    }

    async fn delete_message(&self, _path: OwnedObjectPath) -> zbus::fdo::Result<()> {
        Ok(())
    }
}
