//! `org.freedesktop.ModemManager1.Modem.Modem3gpp`, grounded on
//! `NetworkRegistration`'s property bag plus the modem's own `Serial`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use zbus::zvariant::OwnedValue;

/// `MMModem3gppRegistrationState` values this bridge ever reports.
pub const REGISTRATION_STATE_IDLE: u32 = 0;
pub const REGISTRATION_STATE_HOME: u32 = 1;
pub const REGISTRATION_STATE_SEARCHING: u32 = 2;
pub const REGISTRATION_STATE_ROAMING: u32 = 5;

#[derive(Debug, Clone, Default)]
pub struct Modem3gppState {
    pub imei: String,
    pub registration_state: u32,
    pub operator_code: String,
    pub operator_name: String,
}

impl Modem3gppState {
    pub fn from_props(
        modem_props: &HashMap<String, OwnedValue>,
        netreg_props: Option<&HashMap<String, OwnedValue>>,
    ) -> Self {
        let get_str = |props: &HashMap<String, OwnedValue>, key: &str| -> String {
            props
                .get(key)
                .and_then(|v| String::try_from(v.clone()).ok())
                .unwrap_or_default()
        };
        let imei = get_str(modem_props, "Serial");
        let (registration_state, operator_code, operator_name) = match netreg_props {
            Some(n) => {
                let status = get_str(n, "Status");
                let state = match status.as_str() {
                    "registered" => REGISTRATION_STATE_HOME,
                    "roaming" => REGISTRATION_STATE_ROAMING,
                    "searching" => REGISTRATION_STATE_SEARCHING,
                    _ => REGISTRATION_STATE_IDLE,
                };
                (state, get_str(n, "MobileCountryCode") + &get_str(n, "MobileNetworkCode"), get_str(n, "Name"))
            }
            None => (REGISTRATION_STATE_IDLE, String::new(), String::new()),
        };
        Self { imei, registration_state, operator_code, operator_name }
    }
}

pub struct Modem3gppData {
    state: Mutex<Modem3gppState>,
}

/// Cheap-`Clone` handle over `Arc<Modem3gppData>` (see `facade::sim::Sim`).
#[derive(Clone)]
pub struct Modem3gpp(Arc<Modem3gppData>);

impl std::ops::Deref for Modem3gpp {
    type Target = Modem3gppData;
    fn deref(&self) -> &Modem3gppData {
        &self.0
    }
}

impl Modem3gpp {
    pub fn new(state: Modem3gppState) -> Self {
        Self(Arc::new(Modem3gppData { state: Mutex::new(state) }))
    }

    pub async fn set_state(&self, state: Modem3gppState) {
        *self.state.lock().await = state;
    }
}

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Modem3gpp")]
impl Modem3gpp {
    #[zbus(property)]
    async fn imei(&self) -> String {
        self.state.lock().await.imei.clone()
    }

    #[zbus(property, name = "RegistrationState")]
    async fn registration_state(&self) -> u32 {
        self.state.lock().await.registration_state
    }

    #[zbus(property, name = "OperatorCode")]
    async fn operator_code(&self) -> String {
        self.state.lock().await.operator_code.clone()
    }

    #[zbus(property, name = "OperatorName")]
    async fn operator_name(&self) -> String {
        self.state.lock().await.operator_name.clone()
    }

    async fn register(&self, _operator_id: &str) -> zbus::fdo::Result<()> {
        Ok(())
    }

    async fn scan(&self) -> zbus::fdo::Result<Vec<HashMap<String, OwnedValue>>> {
        Ok(Vec::new())
    }
}
