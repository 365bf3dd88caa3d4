use std::collections::HashMap;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

#[zbus::proxy(
    interface = "org.ofono.ConnectionManager",
    default_service = "org.ofono"
)]
pub trait ConnectionManager {
    #[zbus(name = "GetProperties")]
    fn get_properties(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(name = "GetContexts")]
    fn get_contexts(&self) -> zbus::Result<Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>>;

    #[zbus(name = "AddContext")]
    fn add_context(&self, context_type: &str) -> zbus::Result<OwnedObjectPath>;

    #[zbus(name = "RemoveContext")]
    fn remove_context(&self, path: &OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(signal)]
    fn context_added(&self, path: OwnedObjectPath, properties: HashMap<String, OwnedValue>);

    #[zbus(signal)]
    fn context_removed(&self, path: OwnedObjectPath);
}

#[zbus::proxy(
    interface = "org.ofono.ConnectionContext",
    default_service = "org.ofono"
)]
pub trait ConnectionContext {
    #[zbus(name = "GetProperties")]
    fn get_properties(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(name = "SetProperty")]
    fn set_property(&self, name: &str, value: &Value<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    fn property_changed(&self, name: String, value: OwnedValue);
}
