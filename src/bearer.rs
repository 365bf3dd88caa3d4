//! Bearer subsystem (C4): one exported `org.freedesktop.ModemManager1.Bearer`
//! object per oFono "internet" connection context, plus the reconnection
//! policy that keeps `Active` and `Connected` in step without oscillating.

use crate::dbus_util::emit_properties_changed;
use crate::ofono::{ConnectionContextProxy, ConnectionManagerProxy};
use crate::projection::diff_maps;
use crate::types::*;
use anyhow::Context as _;
use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

/// Narrow callback interface back into the owning modem controller (spec
/// §9: avoid a direct cyclic reference between bearer and controller).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BearerHost: Send + Sync {
    /// Appends `(interface, AT=2)` to the modem's `Ports` the first time a
    /// bearer reports a network interface name (spec §4.4).
    async fn add_port(&self, interface: String);
    /// Asks the controller to recompute and re-emit the modem projection;
    /// a bearer's `Connected` flag feeds directly into it (spec §4.3 rule 10).
    async fn reproject(&self);
}

pub fn bearer_path(index: u64) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("/org/freedesktop/ModemManager/Bearer/{index}"))
        .expect("bearer path is always valid")
}

#[derive(Debug, Clone)]
pub struct BearerState {
    pub interface: String,
    pub connected: bool,
    pub suspended: bool,
    pub multiplexed: bool,
    pub ip4_method: IpMethod,
    pub address: String,
    pub dns: Vec<String>,
    pub gateway: String,
    pub reload_stats_supported: bool,
    pub ip_timeout: u32,
    pub bearer_type: u32,
    pub apn: String,
    pub ip_type: u32,
    pub apn_type: u32,
    pub allowed_auth: AllowedAuth,
    pub user: String,
    pub password: String,
    pub access_type_preference: u32,
    pub roaming_allowance: RoamingAllowance,
    pub profile_id: i32,
    pub profile_name: String,
    pub profile_enabled: bool,
    pub profile_source: u32,
}

impl Default for BearerState {
    fn default() -> Self {
        Self {
            interface: String::new(),
            connected: false,
            suspended: false,
            multiplexed: true,
            ip4_method: IpMethod::Unknown,
            address: String::new(),
            dns: Vec::new(),
            gateway: String::new(),
            reload_stats_supported: false,
            ip_timeout: 0,
            bearer_type: 1,
            apn: String::new(),
            ip_type: BEARER_IP_FAMILY_IPV4,
            apn_type: BEARER_APN_TYPE_DEFAULT,
            allowed_auth: AllowedAuth::Unknown,
            user: String::new(),
            password: String::new(),
            access_type_preference: 0,
            roaming_allowance: RoamingAllowance::None,
            profile_id: -1,
            profile_name: String::new(),
            profile_enabled: true,
            profile_source: BEARER_PROFILE_SOURCE_UNKNOWN,
        }
    }
}

fn ov<'a, T: Into<Value<'a>>>(v: T) -> OwnedValue {
    OwnedValue::try_from(v.into()).expect("value always converts to owned")
}

fn prop_str(props: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    props.get(key).and_then(|v| String::try_from(v.clone()).ok())
}

fn prop_bool(props: &HashMap<String, OwnedValue>, key: &str) -> Option<bool> {
    props.get(key).and_then(|v| bool::try_from(v.clone()).ok())
}

/// Whether `settings`'s `Interface` names a device the bearer hasn't
/// reported before, split out of `apply_settings` so the detection is
/// testable independent of any live proxy.
fn detect_new_interface(current: &str, new_iface: &str) -> Option<String> {
    (current != new_iface).then(|| new_iface.to_string())
}

async fn notify_new_interface(host: &Arc<dyn BearerHost>, interface: String) {
    host.add_port(interface).await;
}

impl BearerState {
    pub fn to_property_map(&self) -> HashMap<String, OwnedValue> {
        let mut ip4: HashMap<String, OwnedValue> = HashMap::new();
        ip4.insert("method".into(), ov(self.ip4_method as u32));
        ip4.insert("address".into(), ov(self.address.clone()));
        for (i, dns) in self.dns.iter().take(3).enumerate() {
            ip4.insert(format!("dns{}", i + 1), ov(dns.clone()));
        }
        ip4.insert("gateway".into(), ov(self.gateway.clone()));

        let mut properties: HashMap<String, OwnedValue> = HashMap::new();
        properties.insert("apn".into(), ov(self.apn.clone()));
        properties.insert("ip-type".into(), ov(self.ip_type));
        properties.insert("apn-type".into(), ov(self.apn_type));
        properties.insert("allowed-auth".into(), ov(self.allowed_auth as u32));
        properties.insert("user".into(), ov(self.user.clone()));
        properties.insert("password".into(), ov(self.password.clone()));
        properties.insert("access-type-preference".into(), ov(self.access_type_preference));
        properties.insert("roaming-allowance".into(), ov(self.roaming_allowance as u32));
        properties.insert("profile-id".into(), ov(self.profile_id));
        properties.insert("profile-name".into(), ov(self.profile_name.clone()));
        properties.insert("profile-enabled".into(), ov(self.profile_enabled));
        properties.insert("profile-source".into(), ov(self.profile_source));

        let mut out = HashMap::new();
        out.insert("Interface".into(), ov(self.interface.clone()));
        out.insert("Connected".into(), ov(self.connected));
        out.insert("Suspended".into(), ov(self.suspended));
        out.insert("Multiplexed".into(), ov(self.multiplexed));
        out.insert("Ip4Config".into(), ov(ip4));
        out.insert("Ip6Config".into(), ov(HashMap::<String, OwnedValue>::new()));
        out.insert("ReloadStatsSupported".into(), ov(self.reload_stats_supported));
        out.insert("IpTimeout".into(), ov(self.ip_timeout));
        out.insert("BearerType".into(), ov(self.bearer_type));
        out.insert("Properties".into(), ov(properties));
        out
    }
}

/// One exported bearer. `index`/`context_path` are fixed at construction;
/// everything else lives behind `state` so the `#[zbus::interface]` methods
/// below (which only ever see `&self`) can still mutate it.
///
/// `Bearer` is a thin, cheaply-`Clone`-able handle over `Arc<BearerData>`: the
/// same live bearer is both handed to the object server (which takes
/// ownership of one clone for dispatch) and kept in the modem controller's
/// own bearer list (for `is_connected` checks and feeding `PropertyChanged`
/// signals from the listener task into it).
pub struct BearerData {
    pub index: u64,
    pub context_path: OwnedObjectPath,
    context: ConnectionContextProxy<'static>,
    connection_manager: ConnectionManagerProxy<'static>,
    host: Arc<dyn BearerHost>,
    state: Mutex<BearerState>,
    last_emitted: Mutex<HashMap<String, OwnedValue>>,
    disconnecting: AtomicBool,
    reconnect_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct Bearer(Arc<BearerData>);

impl std::ops::Deref for Bearer {
    type Target = BearerData;
    fn deref(&self) -> &BearerData {
        &self.0
    }
}

impl Bearer {
    pub fn new(
        index: u64,
        context_path: OwnedObjectPath,
        context: ConnectionContextProxy<'static>,
        connection_manager: ConnectionManagerProxy<'static>,
        host: Arc<dyn BearerHost>,
        initial: BearerState,
    ) -> Self {
        let snapshot = initial.to_property_map();
        Self(Arc::new(BearerData {
            index,
            context_path,
            context,
            connection_manager,
            host,
            state: Mutex::new(initial),
            last_emitted: Mutex::new(snapshot),
            disconnecting: AtomicBool::new(false),
            reconnect_task: Mutex::new(None),
        }))
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    /// Connects this bearer without going through the exported D-Bus
    /// method, for the startup data-context activation loop
    /// (SPEC_FULL.md §C).
    pub async fn activate(&self) -> anyhow::Result<()> {
        let ctxt = zbus::SignalContext::new(self.connection_manager.connection().clone(), bearer_path(self.index))?;
        self.do_connect(&ctxt).await
    }

    async fn emit_diff(&self, ctxt: &zbus::SignalContext<'_>) -> zbus::Result<()> {
        let new_map = self.state.lock().await.to_property_map();
        let mut last = self.last_emitted.lock().await;
        let changed = diff_maps(&last, &new_map);
        *last = new_map;
        emit_properties_changed(ctxt, "org.freedesktop.ModemManager1.Bearer", changed, vec![]).await
    }

    /// Mirrors `mm_bearer.py`'s `set_props`: re-reads the owning context's
    /// APN/auth/credentials and the connection manager's roaming policy.
    pub async fn refresh_properties(&self, ctxt: &zbus::SignalContext<'_>) -> anyhow::Result<()> {
        if let Ok(contexts) = self.connection_manager.get_contexts().await {
            if let Some((_, props)) = contexts.iter().find(|(path, _)| *path == self.context_path) {
                let mut state = self.state.lock().await;
                state.apn = prop_str(props, "AccessPointName").unwrap_or_default();
                state.allowed_auth =
                    ofono_auth_method(&prop_str(props, "AuthenticationMethod").unwrap_or_else(|| "none".into()));
                state.user = prop_str(props, "Username").unwrap_or_default();
                state.password = prop_str(props, "Password").unwrap_or_default();
            }
        }
        if let Ok(conn_props) = self.connection_manager.get_properties().await {
            if let Some(roaming) = prop_bool(&conn_props, "RoamingAllowed") {
                self.state.lock().await.roaming_allowance = roaming_allowance(roaming);
            }
        }
        self.emit_diff(ctxt).await?;
        Ok(())
    }

    async fn cancel_reconnect_task(&self) {
        let handle = self.reconnect_task.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    async fn do_connect(&self, ctxt: &zbus::SignalContext<'_>) -> anyhow::Result<()> {
        self.refresh_properties(ctxt).await?;

        const MAX_ATTEMPTS: u32 = 3;
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.context.set_property("Active", &Value::from(true)).await {
                Ok(()) => {
                    *self.reconnect_task.lock().await = None;
                    return Ok(());
                }
                Err(e) => {
                    warn!("bearer {}: Connect attempt {} failed: {e:#}", self.index, attempt + 1);
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt + 1))).await;
                }
            }
        }
        Err(anyhow::anyhow!(
            "bearer {}: Connect failed after {MAX_ATTEMPTS} attempts: {:?}",
            self.index,
            last_err
        ))
    }

    async fn do_disconnect(&self, ctxt: &zbus::SignalContext<'_>) -> anyhow::Result<()> {
        self.disconnecting.store(true, Ordering::SeqCst);
        self.cancel_reconnect_task().await;
        self.context
            .set_property("Active", &Value::from(false))
            .await
            .context("Disconnect: SetProperty(Active, false) failed")?;
        Ok(())
    }

    async fn spawn_reconnect(&self, ctxt: zbus::SignalContext<'static>) {
        let me = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = me.do_connect(&ctxt).await {
                warn!("bearer {}: reconnect failed: {e:#}", me.index);
            }
        });
        *self.reconnect_task.lock().await = Some(handle);
    }

    async fn apply_settings(&self, settings: OwnedValue, ctxt: &zbus::SignalContext<'_>) -> anyhow::Result<()> {
        let Ok(settings) = <HashMap<String, OwnedValue>>::try_from(settings) else {
            return Ok(());
        };
        let iface = prop_str(&settings, "Interface");
        let mut newly_seen_interface = None;
        {
            let mut state = self.state.lock().await;
            if let Some(method) = prop_str(&settings, "Method") {
                state.ip4_method = ofono_ip_method(&method);
            }
            if let Some(address) = prop_str(&settings, "Address") {
                state.address = address;
            }
            if let Some(gateway) = prop_str(&settings, "Gateway") {
                state.gateway = gateway;
            }
            if let Some(dns) = settings
                .get("DomainNameServers")
                .and_then(|v| <Vec<String>>::try_from(v.clone()).ok())
            {
                state.dns = dns;
            }
            if let Some(ref iface) = iface {
                newly_seen_interface = detect_new_interface(&state.interface, iface);
                state.interface = iface.clone();
            }
        }
        if let Some(iface) = newly_seen_interface {
            let apn = self.state.lock().await.apn.clone();
            crate::network_config::push_apn(&iface, &apn);
            notify_new_interface(&self.host, iface).await;
        }
        self.emit_diff(ctxt).await?;
        Ok(())
    }

    /// Dispatches one `ConnectionContext.PropertyChanged(name, value)`
    /// (spec §4.4, reconnection policy).
    pub async fn handle_context_property_changed(
        &self,
        name: &str,
        value: OwnedValue,
        ctxt: &zbus::SignalContext<'_>,
    ) -> anyhow::Result<()> {
        match name {
            "Active" => {
                let active = bool::try_from(value).unwrap_or(false);
                let was_connected = {
                    let mut state = self.state.lock().await;
                    let was_connected = state.connected;
                    state.connected = active;
                    was_connected
                };
                self.emit_diff(ctxt).await?;
                self.host.reproject().await;

                if !active {
                    if self.disconnecting.swap(false, Ordering::SeqCst) {
                        // Expected transition during Disconnect(): flag cleared, nothing else to do.
                    } else {
                        let in_flight = self.reconnect_task.lock().await.is_some();
                        if !in_flight && was_connected {
                            self.spawn_reconnect(ctxt.to_owned()).await;
                        }
                    }
                }
            }
            "Settings" => self.apply_settings(value, ctxt).await?,
            _ => {}
        }
        Ok(())
    }
}

#[zbus::interface(name = "org.freedesktop.ModemManager1.Bearer")]
impl Bearer {
    async fn connect(&self, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> zbus::fdo::Result<()> {
        self.do_connect(&ctxt)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{e:#}")))
    }

    async fn disconnect(&self, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> zbus::fdo::Result<()> {
        self.do_disconnect(&ctxt)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{e:#}")))
    }

    #[zbus(property)]
    async fn interface(&self) -> String {
        self.state.lock().await.interface.clone()
    }

    #[zbus(property)]
    async fn connected(&self) -> bool {
        self.state.lock().await.connected
    }

    #[zbus(property)]
    async fn suspended(&self) -> bool {
        self.state.lock().await.suspended
    }

    #[zbus(property)]
    async fn multiplexed(&self) -> bool {
        self.state.lock().await.multiplexed
    }

    #[zbus(property, name = "Ip4Config")]
    async fn ip4_config(&self) -> HashMap<String, OwnedValue> {
        let state = self.state.lock().await;
        let full = state.to_property_map();
        <HashMap<String, OwnedValue>>::try_from(full.get("Ip4Config").unwrap().clone()).unwrap_or_default()
    }

    #[zbus(property, name = "Ip6Config")]
    async fn ip6_config(&self) -> HashMap<String, OwnedValue> {
        HashMap::new()
    }

    #[zbus(property)]
    async fn reload_stats_supported(&self) -> bool {
        self.state.lock().await.reload_stats_supported
    }

    #[zbus(property)]
    async fn ip_timeout(&self) -> u32 {
        self.state.lock().await.ip_timeout
    }

    #[zbus(property)]
    async fn bearer_type(&self) -> u32 {
        self.state.lock().await.bearer_type
    }

    #[zbus(property)]
    async fn properties(&self) -> HashMap<String, OwnedValue> {
        let state = self.state.lock().await;
        let full = state.to_property_map();
        <HashMap<String, OwnedValue>>::try_from(full.get("Properties").unwrap().clone()).unwrap_or_default()
    }
}

/// Finds every oFono `ConnectionContext` of type "internet" at modem export
/// (spec §4.4, "Discovery at modem export").
pub async fn discover_internet_contexts(
    connection_manager: &ConnectionManagerProxy<'_>,
) -> anyhow::Result<Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>> {
    let contexts = connection_manager
        .get_contexts()
        .await
        .context("ConnectionManager.GetContexts failed")?;
    Ok(contexts
        .into_iter()
        .filter(|(_, props)| prop_str(props, "Type").as_deref() == Some("internet"))
        .collect())
}

/// Builds the initial `BearerState` for a freshly discovered context.
pub fn initial_state_from_context(props: &HashMap<String, OwnedValue>) -> BearerState {
    let mut state = BearerState::default();
    state.apn = prop_str(props, "AccessPointName").unwrap_or_default();
    state.connected = prop_bool(props, "Active").unwrap_or(false);
    if let Some(settings) = props
        .get("Settings")
        .and_then(|v| <HashMap<String, OwnedValue>>::try_from(v.clone()).ok())
    {
        if let Some(method) = prop_str(&settings, "Method") {
            state.ip4_method = ofono_ip_method(&method);
        }
        state.address = prop_str(&settings, "Address").unwrap_or_default();
        state.gateway = prop_str(&settings, "Gateway").unwrap_or_default();
        if let Some(dns) = settings
            .get("DomainNameServers")
            .and_then(|v| <Vec<String>>::try_from(v.clone()).ok())
        {
            state.dns = dns;
        }
        state.interface = prop_str(&settings, "Interface").unwrap_or_default();
    }
    state
}

/// Implements `CreateBearer(props)` (spec §4.4) up through context creation;
/// returns the oFono context path of the newly added "internet" context. The
/// caller assigns the bearer index and exports the object, so the object
/// path handed back to the D-Bus client is always the one actually exported
/// (no post-increment drift).
pub async fn create_bearer_context(
    connection_manager: &ConnectionManagerProxy<'_>,
    props: &HashMap<String, OwnedValue>,
) -> anyhow::Result<OwnedObjectPath> {
    let connection = connection_manager.connection().clone();
    let contexts = connection_manager
        .get_contexts()
        .await
        .context("GetContexts failed")?;
    for (path, context_props) in &contexts {
        let is_internet_with_apn = prop_str(context_props, "Type").as_deref() == Some("internet")
            && !prop_str(context_props, "AccessPointName").unwrap_or_default().is_empty();
        if !is_internet_with_apn {
            continue;
        }
        if let Ok(existing) = ConnectionContextProxy::builder(&connection)
            .path(path.clone())?
            .build()
            .await
        {
            let _ = existing.set_property("Active", &Value::from(false)).await;
            if let Some(apn) = prop_str(props, "apn") {
                let _ = existing.set_property("AccessPointName", &Value::from(apn)).await;
            }
            let _ = existing.set_property("Protocol", &Value::from("ip")).await;
            let _ = existing.set_property("Active", &Value::from(true)).await;
        }
        break;
    }

    let new_path = connection_manager
        .add_context("internet")
        .await
        .context("AddContext failed")?;
    let new_context = ConnectionContextProxy::builder(&connection)
        .path(new_path.clone())?
        .build()
        .await
        .context("failed to build context proxy for new bearer")?;
    if let Some(apn) = prop_str(props, "apn") {
        let _ = new_context.set_property("AccessPointName", &Value::from(apn)).await;
    }
    if let Some(user) = prop_str(props, "user") {
        let _ = new_context.set_property("Username", &Value::from(user)).await;
    }
    if let Some(password) = prop_str(props, "password") {
        let _ = new_context.set_property("Password", &Value::from(password)).await;
    }
    let _ = new_context.set_property("Protocol", &Value::from("ip")).await;

    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_carries_fixed_property_defaults() {
        let state = BearerState::default();
        assert_eq!(state.bearer_type, 1);
        assert_eq!(state.ip_type, BEARER_IP_FAMILY_IPV4);
        assert_eq!(state.apn_type, BEARER_APN_TYPE_DEFAULT);
        assert_eq!(state.profile_id, -1);
        assert!(state.profile_enabled);
        assert!(state.multiplexed);
    }

    #[test]
    fn property_map_nests_ip4_config_and_properties() {
        let state = BearerState::default();
        let map = state.to_property_map();
        assert!(map.contains_key("Ip4Config"));
        assert!(map.contains_key("Properties"));
        assert!(map.contains_key("Interface"));
    }

    #[test]
    fn bearer_path_matches_template() {
        assert_eq!(bearer_path(3).as_str(), "/org/freedesktop/ModemManager/Bearer/3");
    }

    #[test]
    fn detect_new_interface_ignores_unchanged_names() {
        assert_eq!(detect_new_interface("rmnet0", "rmnet0"), None);
    }

    #[test]
    fn detect_new_interface_reports_first_and_changed_names() {
        assert_eq!(detect_new_interface("", "rmnet0"), Some("rmnet0".to_string()));
        assert_eq!(detect_new_interface("rmnet0", "rmnet1"), Some("rmnet1".to_string()));
    }

    #[tokio::test]
    async fn notify_new_interface_forwards_to_host() {
        let mut mock = MockBearerHost::new();
        mock.expect_add_port()
            .withf(|iface: &String| iface == "rmnet0")
            .times(1)
            .returning(|_| Box::pin(async {}));
        let host: Arc<dyn BearerHost> = Arc::new(mock);
        notify_new_interface(&host, "rmnet0".to_string()).await;
    }
}
