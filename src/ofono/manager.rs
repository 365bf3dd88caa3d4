use std::collections::HashMap;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

#[zbus::proxy(
    interface = "org.ofono.Manager",
    default_service = "org.ofono",
    default_path = "/"
)]
pub trait Manager {
    #[zbus(name = "GetModems")]
    fn get_modems(&self) -> zbus::Result<Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>>;

    #[zbus(signal)]
    fn modem_added(&self, path: OwnedObjectPath, properties: HashMap<String, OwnedValue>);

    #[zbus(signal)]
    fn modem_removed(&self, path: OwnedObjectPath);
}
