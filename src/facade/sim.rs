//! `org.freedesktop.ModemManager1.Sim`, grounded on `SimManager`'s property
//! bag. A modem exclusively owns one of these (spec §3).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use zbus::zvariant::OwnedValue;

#[derive(Debug, Clone, Default)]
pub struct SimState {
    pub active: bool,
    pub sim_identifier: String,
    pub imsi: String,
    pub operator_identifier: String,
    pub operator_name: String,
}

impl SimState {
    pub fn from_sim_manager_props(props: &HashMap<String, OwnedValue>) -> Self {
        let get_str = |key: &str| -> String {
            props
                .get(key)
                .and_then(|v| String::try_from(v.clone()).ok())
                .unwrap_or_default()
        };
        Self {
            active: props
                .get("Present")
                .and_then(|v| bool::try_from(v.clone()).ok())
                .unwrap_or(false),
            sim_identifier: get_str("CardIdentifier"),
            imsi: get_str("SubscriberIdentity"),
            operator_identifier: get_str("MobileCountryCode") + &get_str("MobileNetworkCode"),
            operator_name: get_str("PreferredOperator"),
        }
    }
}

pub struct SimData {
    state: Mutex<SimState>,
}

/// Cheap-`Clone` handle over `Arc<SimData>`: the modem controller keeps one
/// clone to push state updates, the object server keeps another for
/// dispatch, both sharing the same underlying state.
#[derive(Clone)]
pub struct Sim(Arc<SimData>);

impl std::ops::Deref for Sim {
    type Target = SimData;
    fn deref(&self) -> &SimData {
        &self.0
    }
}

impl Sim {
    pub fn new(state: SimState) -> Self {
        Self(Arc::new(SimData { state: Mutex::new(state) }))
    }

    pub async fn set_state(&self, state: SimState) {
        *self.state.lock().await = state;
    }
}

#[zbus::interface(name = "org.freedesktop.ModemManager1.Sim")]
impl Sim {
    #[zbus(property)]
    async fn active(&self) -> bool {
        self.state.lock().await.active
    }

    #[zbus(property, name = "SimIdentifier")]
    async fn sim_identifier(&self) -> String {
        self.state.lock().await.sim_identifier.clone()
    }

    #[zbus(property)]
    async fn imsi(&self) -> String {
        self.state.lock().await.imsi.clone()
    }

    #[zbus(property, name = "OperatorIdentifier")]
    async fn operator_identifier(&self) -> String {
        self.state.lock().await.operator_identifier.clone()
    }

    #[zbus(property, name = "OperatorName")]
    async fn operator_name(&self) -> String {
        self.state.lock().await.operator_name.clone()
    }
}
