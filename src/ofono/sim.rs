use std::collections::HashMap;
use zbus::zvariant::{OwnedValue, Value};

#[zbus::proxy(interface = "org.ofono.SimManager", default_service = "org.ofono")]
pub trait SimManager {
    #[zbus(name = "GetProperties")]
    fn get_properties(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(name = "SetProperty")]
    fn set_property(&self, name: &str, value: &Value<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    fn property_changed(&self, name: String, value: OwnedValue);
}
