//! Modem Controller (C5): owns the property mirror and bearer set for one
//! oFono modem, reacts to interface add/remove and property-change events,
//! and is itself the exported `org.freedesktop.ModemManager1.Modem` object.

use crate::bearer::{bearer_path, discover_internet_contexts, initial_state_from_context, Bearer, BearerHost, BearerState};
use crate::dbus_util::emit_properties_changed;
use crate::facade::modem3gpp::{Modem3gpp, Modem3gppState};
use crate::facade::sim::{Sim, SimState};
use crate::mirror::{PropMap, PropertyMirror};
use crate::mm_error::MmError;
use crate::ofono::{ConnectionContextProxy, ConnectionManagerProxy, ModemProxy, OFONO_SERVICE};
use crate::projection::{diff_maps, project, ProjectionInputs};
use crate::types::*;
use anyhow::Context as _;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::Connection;

pub const MAX_BEARERS: u32 = 4;
pub const MAX_ACTIVE_BEARERS: u32 = 2;
pub const MAX_ACTIVE_MULTIPLEXED_BEARERS: u32 = 2;

#[derive(Debug, Clone)]
pub struct ModemProps {
    pub sim: String,
    pub primary_sim_slot: u32,
    pub bearers: Vec<OwnedObjectPath>,
    pub supported_capabilities: Vec<u32>,
    pub current_capabilities: u32,
    pub manufacturer: String,
    pub model: String,
    pub revision: String,
    pub hardware_revision: String,
    pub device_identifier: String,
    pub device: String,
    pub physdev: String,
    pub ports: Vec<(String, u32)>,
    pub equipment_identifier: String,
    pub unlock_required: u32,
    pub unlock_retries: HashMap<u32, u32>,
    pub state: i32,
    pub state_failed_reason: u32,
    pub access_technologies: u32,
    pub signal_quality: (u32, bool),
    pub own_numbers: Vec<String>,
    pub power_state: u32,
    pub supported_modes: Vec<(u32, u32)>,
    pub current_modes: (u32, u32),
    pub supported_bands: Vec<u32>,
    pub current_bands: Vec<u32>,
}

impl ModemProps {
    fn new(modem_name: &str) -> Self {
        Self {
            sim: "/".to_string(),
            primary_sim_slot: 0,
            bearers: Vec::new(),
            supported_capabilities: vec![Capability::Lte as u32],
            current_capabilities: Capability::Lte as u32,
            manufacturer: "ofono".to_string(),
            model: "binder".to_string(),
            revision: String::new(),
            hardware_revision: String::new(),
            device_identifier: modem_name.to_string(),
            device: modem_name.to_string(),
            physdev: modem_name.to_string(),
            ports: vec![(modem_name.to_string(), PortType::Unknown as u32)],
            equipment_identifier: String::new(),
            unlock_required: Lock::Unknown as u32,
            unlock_retries: HashMap::new(),
            state: ModemState::Unknown as i32,
            state_failed_reason: StateFailedReason::None as u32,
            access_technologies: AccessTechnology::Unknown as u32,
            signal_quality: (0, false),
            own_numbers: Vec::new(),
            power_state: POWER_STATE_OFF,
            supported_modes: Vec::new(),
            current_modes: (MODE_ANY, MODE_ANY),
            supported_bands: vec![0],
            current_bands: vec![0],
        }
    }

    fn to_property_map(&self, modem_name: &str, sim_slots: &[OwnedObjectPath]) -> PropMap {
        let mut m = HashMap::new();
        let ov = |v: Value<'_>| OwnedValue::try_from(v).expect("value always converts to owned");
        m.insert("Sim".into(), ov(Value::from(OwnedObjectPath::try_from(self.sim.clone()).unwrap_or_else(|_| OwnedObjectPath::try_from("/").unwrap()))));
        m.insert("SimSlots".into(), ov(Value::from(sim_slots.to_vec())));
        m.insert("PrimarySimSlot".into(), ov(Value::from(self.primary_sim_slot)));
        m.insert("Bearers".into(), ov(Value::from(self.bearers.clone())));
        m.insert("SupportedCapabilities".into(), ov(Value::from(self.supported_capabilities.clone())));
        m.insert("CurrentCapabilities".into(), ov(Value::from(self.current_capabilities)));
        m.insert("MaxBearers".into(), ov(Value::from(MAX_BEARERS)));
        m.insert("MaxActiveBearers".into(), ov(Value::from(MAX_ACTIVE_BEARERS)));
        m.insert("MaxActiveMultiplexedBearers".into(), ov(Value::from(MAX_ACTIVE_MULTIPLEXED_BEARERS)));
        m.insert("Manufacturer".into(), ov(Value::from(self.manufacturer.clone())));
        m.insert("Model".into(), ov(Value::from(self.model.clone())));
        m.insert("Revision".into(), ov(Value::from(self.revision.clone())));
        m.insert("HardwareRevision".into(), ov(Value::from(self.hardware_revision.clone())));
        m.insert("DeviceIdentifier".into(), ov(Value::from(self.device_identifier.clone())));
        m.insert("Device".into(), ov(Value::from(self.device.clone())));
        m.insert("Physdev".into(), ov(Value::from(self.physdev.clone())));
        m.insert("Drivers".into(), ov(Value::from(vec!["binder".to_string()])));
        m.insert("Plugin".into(), ov(Value::from("ofono2mm".to_string())));
        m.insert("PrimaryPort".into(), ov(Value::from(modem_name.to_string())));
        let ports: Vec<(String, u32)> = self.ports.clone();
        m.insert("Ports".into(), ov(Value::from(ports)));
        m.insert("EquipmentIdentifier".into(), ov(Value::from(self.equipment_identifier.clone())));
        m.insert("UnlockRequired".into(), ov(Value::from(self.unlock_required)));
        let retries: HashMap<u32, u32> = self.unlock_retries.clone();
        m.insert("UnlockRetries".into(), ov(Value::from(retries)));
        m.insert("State".into(), ov(Value::from(self.state)));
        m.insert("StateFailedReason".into(), ov(Value::from(self.state_failed_reason)));
        m.insert("AccessTechnologies".into(), ov(Value::from(self.access_technologies)));
        m.insert("SignalQuality".into(), ov(Value::from(self.signal_quality)));
        m.insert("OwnNumbers".into(), ov(Value::from(self.own_numbers.clone())));
        m.insert("PowerState".into(), ov(Value::from(self.power_state)));
        m.insert("SupportedModes".into(), ov(Value::from(self.supported_modes.clone())));
        m.insert("CurrentModes".into(), ov(Value::from(self.current_modes)));
        m.insert("SupportedBands".into(), ov(Value::from(self.supported_bands.clone())));
        m.insert("CurrentBands".into(), ov(Value::from(self.current_bands.clone())));
        m.insert("SupportedIpFamilies".into(), ov(Value::from(3u32)));
        m
    }
}

/// One modem's bearer set, mirror, and oFono sub-proxies. Exported at
/// `/org/freedesktop/ModemManager1/Modem/{index}`.
pub struct ModemControllerData {
    pub index: u64,
    pub modem_name: String,
    pub modem_path: OwnedObjectPath,
    pub sim_path: OwnedObjectPath,
    connection: Connection,
    modem_proxy: ModemProxy<'static>,
    mirror: Mutex<PropertyMirror>,
    props: Mutex<ModemProps>,
    last_emitted: Mutex<PropMap>,
    bearer_counter: Arc<AtomicU64>,
    bearers: Mutex<Vec<Bearer>>,
    connection_manager: Mutex<Option<ConnectionManagerProxy<'static>>>,
    listener_tasks: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
    self_listener: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub sim_facade: Sim,
    pub modem3gpp_facade: Modem3gpp,
}

/// Cheap-`Clone` handle over `Arc<ModemControllerData>`: zbus exports this
/// type directly (the `#[zbus::interface]` impl below is on `ModemController`
/// itself), while `Daemon` and background tasks keep their own clones of the
/// same shared state (see `facade::sim::Sim` for the same pattern).
#[derive(Clone)]
pub struct ModemController(Arc<ModemControllerData>);

impl std::ops::Deref for ModemController {
    type Target = ModemControllerData;
    fn deref(&self) -> &ModemControllerData {
        &self.0
    }
}

pub fn modem_path(index: u64) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("/org/freedesktop/ModemManager1/Modem/{index}"))
        .expect("modem path is always valid")
}

pub fn sim_path(index: u64) -> OwnedObjectPath {
    OwnedObjectPath::try_from(format!("/org/freedesktop/ModemManager/SIM/{index}"))
        .expect("sim path is always valid")
}

impl ModemController {
    pub fn new(
        index: u64,
        modem_name: String,
        connection: Connection,
        modem_proxy: ModemProxy<'static>,
        bearer_counter: Arc<AtomicU64>,
    ) -> Self {
        let initial = ModemProps::new(&modem_name);
        let last_emitted = initial.to_property_map(&modem_name, &[]);
        Self(Arc::new(ModemControllerData {
            modem_path: modem_path(index),
            sim_path: sim_path(index),
            index,
            modem_name,
            connection,
            modem_proxy,
            mirror: Mutex::new(PropertyMirror::new()),
            props: Mutex::new(initial),
            last_emitted: Mutex::new(last_emitted),
            bearer_counter,
            bearers: Mutex::new(Vec::new()),
            connection_manager: Mutex::new(None),
            listener_tasks: Mutex::new(HashMap::new()),
            self_listener: Mutex::new(None),
            sim_facade: Sim::new(SimState::default()),
            modem3gpp_facade: Modem3gpp::new(Modem3gppState::default()),
        }))
    }

    pub fn path(&self) -> &OwnedObjectPath {
        &self.modem_path
    }

    fn signal_context(&self) -> zbus::Result<zbus::SignalContext<'static>> {
        zbus::SignalContext::new(self.connection.clone(), self.modem_path.clone())
    }

    async fn emit_diff(&self) -> anyhow::Result<()> {
        let new_map = {
            let props = self.props.lock().await;
            props.to_property_map(&self.modem_name, &[self.sim_path.clone()])
        };
        let mut last = self.last_emitted.lock().await;
        let changed = diff_maps(&last, &new_map);
        *last = new_map;
        let ctxt = self.signal_context()?;
        emit_properties_changed(&ctxt, "org.freedesktop.ModemManager1.Modem", changed, vec![]).await?;
        Ok(())
    }

    /// Runs C3 against the current mirror + bearer set and emits the diff
    /// (and `StateChanged` if the state itself moved) (spec §4.3 tail).
    pub async fn reproject_and_emit(&self) -> anyhow::Result<()> {
        let (modem_snapshot, sim_snapshot, netreg_snapshot, radio_snapshot) = {
            let mirror = self.mirror.lock().await;
            (
                mirror.modem_props().props().clone(),
                mirror.interface("SimManager").map(|m| m.props().clone()),
                mirror.interface("NetworkRegistration").map(|m| m.props().clone()),
                mirror.interface("RadioSettings").map(|m| m.props().clone()),
            )
        };

        let mut any_connected = false;
        let bearer_paths = {
            let bearers = self.bearers.lock().await;
            for b in bearers.iter() {
                if b.is_connected().await {
                    any_connected = true;
                }
            }
            bearers.iter().map(|b| bearer_path(b.index)).collect::<Vec<_>>()
        };

        let projection = project(&ProjectionInputs {
            modem_props: &modem_snapshot,
            sim: sim_snapshot.as_ref(),
            sim_path: self.sim_path.as_str(),
            network_registration: netreg_snapshot.as_ref(),
            radio_settings: radio_snapshot.as_ref(),
            any_bearer_connected: any_connected,
        });

        if let Some(sim_props) = sim_snapshot.as_ref() {
            self.sim_facade.set_state(SimState::from_sim_manager_props(sim_props)).await;
        }
        self.modem3gpp_facade
            .set_state(Modem3gppState::from_props(&modem_snapshot, netreg_snapshot.as_ref()))
            .await;

        let old_state;
        {
            let mut props = self.props.lock().await;
            old_state = props.state;
            props.sim = projection.sim;
            props.bearers = bearer_paths;
            props.supported_capabilities = projection.supported_capabilities;
            props.current_capabilities = projection.current_capabilities;
            props.equipment_identifier = projection.equipment_identifier;
            props.hardware_revision = projection.hardware_revision;
            props.revision = projection.revision;
            props.manufacturer = projection.manufacturer;
            props.model = projection.model;
            props.unlock_required = projection.unlock_required as u32;
            props.unlock_retries = projection.unlock_retries;
            props.state = projection.state.as_i32();
            props.state_failed_reason = projection.state_failed_reason as u32;
            props.access_technologies = projection.access_technologies;
            props.signal_quality = projection.signal_quality;
            props.own_numbers = projection.own_numbers;
            props.power_state = projection.power_state;
            props.supported_modes = projection.supported_modes.into_iter().map(|m| (m.0, m.1)).collect();
            props.current_modes = (projection.current_modes.0, projection.current_modes.1);
        }

        self.emit_diff().await?;

        let new_state = self.props.lock().await.state;
        if old_state != new_state {
            let ctxt = self.signal_context()?;
            Self::state_changed(&ctxt, old_state, new_state, 1).await?;
        }
        Ok(())
    }

    async fn stop_listener(&self, name: &str) {
        if let Some(handle) = self.listener_tasks.lock().await.remove(name) {
            handle.abort();
        }
    }

    async fn spawn_listener(&self, key: String, proxy: zbus::Proxy<'static>) -> anyhow::Result<()> {
        let me = self.clone();
        let key_for_task = key.clone();
        let handle = tokio::spawn(async move {
            let Ok(mut stream) = proxy.receive_signal("PropertyChanged").await else {
                return;
            };
            while let Some(msg) = stream.next().await {
                if let Ok((name, value)) = msg.body().deserialize::<(String, OwnedValue)>() {
                    me.on_interface_property_changed(&key_for_task, name, value).await;
                }
            }
        });
        self.listener_tasks.lock().await.insert(key, handle);
        Ok(())
    }

    async fn on_interface_property_changed(&self, interface: &str, name: String, value: OwnedValue) {
        self.mirror
            .lock()
            .await
            .set_interface_property(interface, name, value);
        if let Err(e) = self.reproject_and_emit().await {
            warn!("{}: reproject after {interface} change failed: {e:#}", self.modem_name);
        }
    }

    /// Builds a generic, dynamically-typed proxy for an arbitrary bare
    /// oFono interface name on this modem's own path. Every oFono
    /// sub-interface shares the `GetProperties`/`SetProperty`/
    /// `PropertyChanged` shape (spec §4.1), so one helper covers them all.
    async fn dynamic_interface_proxy(&self, bare_name: &str) -> anyhow::Result<zbus::Proxy<'static>> {
        zbus::Proxy::new(
            &self.connection,
            OFONO_SERVICE,
            self.modem_name.clone(),
            format!("org.ofono.{bare_name}"),
        )
        .await
        .with_context(|| format!("failed to build proxy for org.ofono.{bare_name}"))
    }

    async fn add_interface(&self, name: &str) -> anyhow::Result<()> {
        let proxy = self.dynamic_interface_proxy(name).await?;
        let props: PropMap = match proxy.call_method("GetProperties", &()).await {
            Ok(reply) => reply.body().deserialize().unwrap_or_default(),
            Err(e) => {
                warn!("{}: GetProperties({name}) failed, using empty defaults: {e:#}", self.modem_name);
                PropMap::new()
            }
        };
        self.mirror.lock().await.add_interface(name, props);

        if name == "ConnectionManager" {
            self.setup_connection_manager().await?;
        }
        self.spawn_listener(name.to_string(), proxy).await?;
        Ok(())
    }

    /// Diffs the modem's `Interfaces` property against what's currently
    /// mirrored: added interfaces are fetched and subscribed, removed ones
    /// are dropped, both before the next projection runs (spec §4.5a).
    pub async fn sync_interfaces(&self) -> anyhow::Result<()> {
        let modem_props = self
            .modem_proxy
            .get_properties()
            .await
            .context("Modem.GetProperties failed")?;
        self.mirror.lock().await.set_modem_props(modem_props.clone());

        let current: Vec<String> = modem_props
            .get("Interfaces")
            .and_then(|v| <Vec<String>>::try_from(v.clone()).ok())
            .unwrap_or_default()
            .iter()
            .map(|full| full.rsplit('.').next().unwrap_or(full).to_string())
            .collect();

        let known = self.mirror.lock().await.interface_names();
        for removed in known.iter().filter(|i| !current.contains(i)) {
            self.mirror.lock().await.remove_interface(removed);
            self.stop_listener(removed).await;
        }
        for added in current.iter().filter(|i| !known.contains(i)) {
            if let Err(e) = self.add_interface(added).await {
                warn!("{}: failed to bring up interface {added}: {e:#}", self.modem_name);
            }
        }
        self.reproject_and_emit().await
    }

    /// Subscribes the modem's own `PropertyChanged` signal so interface
    /// add/remove (spec §4.5a) and other modem-level property changes keep
    /// driving the mirror and projection for the object's whole lifetime,
    /// not just at export time.
    pub async fn spawn_self_listener(&self) -> anyhow::Result<()> {
        let proxy = zbus::Proxy::new(
            &self.connection,
            OFONO_SERVICE,
            self.modem_name.clone(),
            "org.ofono.Modem",
        )
        .await
        .context("failed to build proxy for org.ofono.Modem")?;
        let me = self.clone();
        let handle = tokio::spawn(async move {
            let Ok(mut stream) = proxy.receive_signal("PropertyChanged").await else {
                return;
            };
            while let Some(msg) = stream.next().await {
                if let Ok((name, value)) = msg.body().deserialize::<(String, OwnedValue)>() {
                    me.mirror.lock().await.set_modem_property(name.clone(), value);
                    if name == "Interfaces" {
                        if let Err(e) = me.sync_interfaces().await {
                            warn!("{}: sync_interfaces after Interfaces change failed: {e:#}", me.modem_name);
                        }
                    } else if let Err(e) = me.reproject_and_emit().await {
                        warn!("{}: reproject after Modem.{name} change failed: {e:#}", me.modem_name);
                    }
                }
            }
        });
        *self.self_listener.lock().await = Some(handle);
        Ok(())
    }

    async fn setup_connection_manager(&self) -> anyhow::Result<()> {
        let cm = ConnectionManagerProxy::builder(&self.connection)
            .destination(OFONO_SERVICE)?
            .path(self.modem_name.clone())?
            .build()
            .await
            .context("failed to build ConnectionManager proxy")?;

        for (path, props) in discover_internet_contexts(&cm).await.unwrap_or_default() {
            if let Err(e) = self.add_bearer_for_context(&cm, path, props).await {
                warn!("{}: failed to mirror existing context: {e:#}", self.modem_name);
            }
        }

        if let Ok(mut added) = cm.receive_context_added().await {
            let me = self.clone();
            let cm_for_task = cm.clone();
            tokio::spawn(async move {
                while let Some(signal) = added.next().await {
                    if let Ok(args) = signal.args() {
                        let path = args.path().to_owned();
                        let props = args.properties().clone();
                        if props.get("Type").and_then(|v| String::try_from(v.clone()).ok()).as_deref()
                            == Some("internet")
                        {
                            if let Err(e) = me.add_bearer_for_context(&cm_for_task, path, props).await {
                                warn!("{}: ContextAdded handling failed: {e:#}", me.modem_name);
                            }
                        }
                    }
                }
            });
        }

        if let Ok(mut removed) = cm.receive_context_removed().await {
            let me = self.clone();
            tokio::spawn(async move {
                while let Some(signal) = removed.next().await {
                    if let Ok(args) = signal.args() {
                        me.drop_bearer_for_context(args.path()).await;
                        let _ = me.reproject_and_emit().await;
                    }
                }
            });
        }

        *self.connection_manager.lock().await = Some(cm);
        Ok(())
    }

    async fn add_bearer_for_context(
        &self,
        cm: &ConnectionManagerProxy<'static>,
        context_path: OwnedObjectPath,
        props: PropMap,
    ) -> anyhow::Result<OwnedObjectPath> {
        let index = self.bearer_counter.fetch_add(1, Ordering::SeqCst);
        let context_proxy = crate::ofono::ConnectionContextProxy::builder(&self.connection)
            .destination(OFONO_SERVICE)?
            .path(context_path.clone())?
            .build()
            .await
            .context("failed to build ConnectionContext proxy")?;

        let bearer = Bearer::new(
            index,
            context_path.clone(),
            context_proxy,
            cm.clone(),
            Arc::new(self.clone()) as Arc<dyn BearerHost>,
            initial_state_from_context(&props),
        );
        self.bearers.lock().await.push(bearer.clone());

        if let Some(iface) = props
            .get("Settings")
            .and_then(|v| <PropMap>::try_from(v.clone()).ok())
            .and_then(|s| s.get("Interface").and_then(|v| String::try_from(v.clone()).ok()))
        {
            self.add_port(iface).await;
        }

        let dynamic_proxy = zbus::Proxy::new(
            &self.connection,
            OFONO_SERVICE,
            context_path.clone(),
            "org.ofono.ConnectionContext",
        )
        .await
        .context("failed to build dynamic ConnectionContext proxy for listening")?;
        let connection = self.connection.clone();
        let bearer_for_task = bearer.clone();
        tokio::spawn(async move {
            let Ok(mut stream) = dynamic_proxy.receive_signal("PropertyChanged").await else {
                return;
            };
            let Ok(ctxt) = zbus::SignalContext::new(connection, bearer_path(bearer_for_task.index)) else {
                return;
            };
            while let Some(msg) = stream.next().await {
                if let Ok((name, value)) = msg.body().deserialize::<(String, OwnedValue)>() {
                    let _ = bearer_for_task
                        .handle_context_property_changed(&name, value, &ctxt)
                        .await;
                }
            }
        });

        let path = bearer_path(index);
        let object_server = self.connection.object_server();
        object_server
            .at(path.clone(), bearer)
            .await
            .context("failed to export bearer object")?;

        self.reproject_and_emit().await?;
        Ok(path)
    }

    async fn drop_bearer_for_context(&self, context_path: &zbus::zvariant::ObjectPath<'_>) {
        let mut bearers = self.bearers.lock().await;
        if let Some(pos) = bearers.iter().position(|b| b.context_path.as_str() == context_path.as_str()) {
            let bearer = bearers.remove(pos);
            let _ = self.connection.object_server().remove::<Bearer, _>(bearer_path(bearer.index)).await;
        }
    }

    async fn add_port(&self, interface: String) {
        let mut props = self.props.lock().await;
        if !props.ports.iter().any(|(i, _)| *i == interface) {
            props.ports.push((interface, PortType::At as u32));
        }
    }

    /// Current `SignalQuality` percentage, for the startup data-context
    /// activation loop (SPEC_FULL.md §C).
    pub async fn signal_strength(&self) -> u32 {
        self.props.lock().await.signal_quality.0
    }

    /// Connects the modem's first bearer, if any. Returns `Ok(true)` once a
    /// bearer is successfully activated, `Ok(false)` if there's no bearer
    /// yet to activate.
    pub async fn activate_first_bearer(&self) -> anyhow::Result<bool> {
        let bearer = self.bearers.lock().await.first().cloned();
        match bearer {
            Some(b) => {
                b.activate().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BearerHost for ModemController {
    async fn add_port(&self, interface: String) {
        ModemController::add_port(self, interface).await;
    }

    async fn reproject(&self) {
        if let Err(e) = self.reproject_and_emit().await {
            warn!("{}: reproject from bearer failed: {e:#}", self.modem_name);
        }
    }
}

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem")]
impl ModemController {
    async fn enable(&self, enable: bool, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> zbus::fdo::Result<()> {
        let target = if enable { ModemState::Enabled } else { ModemState::Disabled };
        let old_state = {
            let mut props = self.props.lock().await;
            let old = props.state;
            props.state = target.as_i32();
            old
        };
        Self::state_changed(&ctxt, old_state, target.as_i32(), 1).await.ok();

        self.modem_proxy
            .set_property("Online", &Value::from(enable))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("SetProperty(Online) failed: {e}")))?;

        self.reproject_and_emit()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{e:#}")))
    }

    #[zbus(name = "ListBearers")]
    async fn list_bearers(&self) -> Vec<OwnedObjectPath> {
        self.props.lock().await.bearers.clone()
    }

    #[zbus(name = "CreateBearer")]
    async fn create_bearer(&self, props: HashMap<String, OwnedValue>) -> Result<OwnedObjectPath, MmError> {
        const POLL: Duration = Duration::from_secs(1);
        const MAX_WAIT: Duration = Duration::from_secs(10);
        let mut waited = Duration::ZERO;
        loop {
            if self.connection_manager.lock().await.is_some() {
                break;
            }
            if waited >= MAX_WAIT {
                return Err(MmError::Unsupported(
                    "modem has no ConnectionManager interface".to_string(),
                ));
            }
            tokio::time::sleep(POLL).await;
            waited += POLL;
        }

        let cm = self.connection_manager.lock().await.clone().unwrap();
        let context_path = crate::bearer::create_bearer_context(&cm, &props)
            .await
            .map_err(|e| MmError::Unsupported(format!("{e:#}")))?;

        let context_props = ConnectionContextProxy::builder(&self.connection)
            .destination(OFONO_SERVICE)
            .map_err(|e| MmError::Unsupported(format!("{e:#}")))?
            .path(context_path.clone())
            .map_err(|e| MmError::Unsupported(format!("{e:#}")))?
            .build()
            .await
            .map_err(|e| MmError::Unsupported(format!("failed to build ConnectionContext proxy: {e:#}")))?
            .get_properties()
            .await
            .map_err(|e| MmError::Unsupported(format!("ConnectionContext.GetProperties failed: {e:#}")))?;

        let bearer_path = self
            .add_bearer_for_context(&cm, context_path, context_props)
            .await
            .map_err(|e| MmError::Unsupported(format!("{e:#}")))?;

        debug!("{}: CreateBearer exported {bearer_path}", self.modem_name);
        Ok(bearer_path)
    }

    #[zbus(name = "DeleteBearer")]
    async fn delete_bearer(&self, path: OwnedObjectPath) -> zbus::fdo::Result<()> {
        let target_index = path
            .as_str()
            .rsplit('/')
            .next()
            .and_then(|s| s.parse::<u64>().ok());
        let Some(target_index) = target_index else {
            return Err(zbus::fdo::Error::InvalidArgs("malformed bearer path".into()));
        };

        let bearer = {
            let mut bearers = self.bearers.lock().await;
            let pos = bearers.iter().position(|b| b.index == target_index);
            pos.map(|p| bearers.remove(p))
        };

        if let Some(bearer) = bearer {
            if let Some(cm) = self.connection_manager.lock().await.as_ref() {
                let _ = cm.remove_context(&bearer.context_path).await;
            }
            let _ = self.connection.object_server().remove::<Bearer, _>(bearer_path(bearer.index)).await;
        }

        self.reproject_and_emit()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{e:#}")))
    }

    async fn reset(&self, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> zbus::fdo::Result<()> {
        for (name, value) in [("Powered", false), ("Powered", true), ("Online", true)] {
            let _ = self.modem_proxy.set_property(name, &Value::from(value)).await;
        }
        let old_state = {
            let mut props = self.props.lock().await;
            let old = props.state;
            props.state = ModemState::Enabled.as_i32();
            old
        };
        Self::state_changed(&ctxt, old_state, ModemState::Enabled.as_i32(), 1).await.ok();
        self.reproject_and_emit()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{e:#}")))
    }

    #[zbus(name = "FactoryReset")]
    async fn factory_reset(&self, _code: &str, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> zbus::fdo::Result<()> {
        self.reset(ctxt).await
    }

    #[zbus(name = "SetPowerState")]
    async fn set_power_state(&self, state: u32) -> zbus::fdo::Result<()> {
        let powered = state > POWER_STATE_OFF;
        self.modem_proxy
            .set_property("Powered", &Value::from(powered))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("SetProperty(Powered) failed: {e}")))
    }

    #[zbus(name = "SetCurrentCapabilities")]
    async fn set_current_capabilities(&self, capabilities: u32) -> zbus::fdo::Result<()> {
        self.props.lock().await.current_capabilities = capabilities;
        Ok(())
    }

    #[zbus(name = "SetCurrentModes")]
    async fn set_current_modes(&self, modes: (u32, u32)) -> zbus::fdo::Result<()> {
        let supported = self.props.lock().await.supported_modes.clone();
        let chosen = supported
            .iter()
            .find(|row| row.1 == modes.1)
            .or_else(|| supported.iter().rev().find(|row| row.0 & modes.0 != 0))
            .copied()
            .unwrap_or(modes);

        self.props.lock().await.current_modes = chosen;

        if let Some(tech) = mode_to_ofono(chosen.1) {
            let _ = self
                .modem_proxy
                .set_property("TechnologyPreference", &Value::from(tech))
                .await;
        }
        Ok(())
    }

    #[zbus(name = "SetCurrentBands")]
    async fn set_current_bands(&self, bands: Vec<u32>) -> zbus::fdo::Result<()> {
        self.props.lock().await.current_bands = bands;
        Ok(())
    }

    #[zbus(name = "SetPrimarySimSlot")]
    async fn set_primary_sim_slot(&self, slot: u32) -> zbus::fdo::Result<()> {
        self.props.lock().await.primary_sim_slot = slot;
        Ok(())
    }

    #[zbus(name = "GetCellInfo")]
    async fn get_cell_info(&self) -> Vec<HashMap<String, OwnedValue>> {
        let props = self.props.lock().await;
        let mut record = HashMap::new();
        record.insert(
            "cell-type".to_string(),
            OwnedValue::try_from(Value::from(0u32)).unwrap(),
        );
        record.insert(
            "serving".to_string(),
            OwnedValue::try_from(Value::from(props.state == ModemState::Registered.as_i32())).unwrap(),
        );
        vec![record]
    }

    async fn command(&self, _command: &str, _timeout: u32) -> String {
        String::new()
    }

    #[zbus(signal)]
    async fn state_changed(ctxt: &zbus::SignalContext<'_>, old: i32, new: i32, reason: u32) -> zbus::Result<()>;

    #[zbus(property)]
    async fn sim(&self) -> OwnedObjectPath {
        OwnedObjectPath::try_from(self.props.lock().await.sim.clone())
            .unwrap_or_else(|_| OwnedObjectPath::try_from("/").unwrap())
    }

    #[zbus(property, name = "SimSlots")]
    async fn sim_slots(&self) -> Vec<OwnedObjectPath> {
        vec![self.sim_path.clone()]
    }

    #[zbus(property, name = "PrimarySimSlot")]
    async fn primary_sim_slot(&self) -> u32 {
        self.props.lock().await.primary_sim_slot
    }

    #[zbus(property)]
    async fn bearers(&self) -> Vec<OwnedObjectPath> {
        self.props.lock().await.bearers.clone()
    }

    #[zbus(property, name = "SupportedCapabilities")]
    async fn supported_capabilities(&self) -> Vec<u32> {
        self.props.lock().await.supported_capabilities.clone()
    }

    #[zbus(property, name = "CurrentCapabilities")]
    async fn current_capabilities(&self) -> u32 {
        self.props.lock().await.current_capabilities
    }

    #[zbus(property, name = "MaxBearers")]
    async fn max_bearers(&self) -> u32 {
        MAX_BEARERS
    }

    #[zbus(property, name = "MaxActiveBearers")]
    async fn max_active_bearers(&self) -> u32 {
        MAX_ACTIVE_BEARERS
    }

    #[zbus(property, name = "MaxActiveMultiplexedBearers")]
    async fn max_active_multiplexed_bearers(&self) -> u32 {
        MAX_ACTIVE_MULTIPLEXED_BEARERS
    }

    #[zbus(property)]
    async fn manufacturer(&self) -> String {
        self.props.lock().await.manufacturer.clone()
    }

    #[zbus(property)]
    async fn model(&self) -> String {
        self.props.lock().await.model.clone()
    }

    #[zbus(property)]
    async fn revision(&self) -> String {
        self.props.lock().await.revision.clone()
    }

    #[zbus(property, name = "HardwareRevision")]
    async fn hardware_revision(&self) -> String {
        self.props.lock().await.hardware_revision.clone()
    }

    #[zbus(property, name = "DeviceIdentifier")]
    async fn device_identifier(&self) -> String {
        self.props.lock().await.device_identifier.clone()
    }

    #[zbus(property)]
    async fn device(&self) -> String {
        self.props.lock().await.device.clone()
    }

    #[zbus(property)]
    async fn physdev(&self) -> String {
        self.props.lock().await.physdev.clone()
    }

    #[zbus(property)]
    async fn drivers(&self) -> Vec<String> {
        vec!["binder".to_string()]
    }

    #[zbus(property)]
    async fn plugin(&self) -> String {
        "ofono2mm".to_string()
    }

    #[zbus(property, name = "PrimaryPort")]
    async fn primary_port(&self) -> String {
        self.modem_name.clone()
    }

    #[zbus(property)]
    async fn ports(&self) -> Vec<(String, u32)> {
        self.props.lock().await.ports.clone()
    }

    #[zbus(property, name = "EquipmentIdentifier")]
    async fn equipment_identifier(&self) -> String {
        self.props.lock().await.equipment_identifier.clone()
    }

    #[zbus(property, name = "UnlockRequired")]
    async fn unlock_required(&self) -> u32 {
        self.props.lock().await.unlock_required
    }

    #[zbus(property, name = "UnlockRetries")]
    async fn unlock_retries(&self) -> HashMap<u32, u32> {
        self.props.lock().await.unlock_retries.clone()
    }

    #[zbus(property)]
    async fn state(&self) -> i32 {
        self.props.lock().await.state
    }

    #[zbus(property, name = "StateFailedReason")]
    async fn state_failed_reason(&self) -> u32 {
        self.props.lock().await.state_failed_reason
    }

    #[zbus(property, name = "AccessTechnologies")]
    async fn access_technologies(&self) -> u32 {
        self.props.lock().await.access_technologies
    }

    #[zbus(property, name = "SignalQuality")]
    async fn signal_quality(&self) -> (u32, bool) {
        self.props.lock().await.signal_quality
    }

    #[zbus(property, name = "OwnNumbers")]
    async fn own_numbers(&self) -> Vec<String> {
        self.props.lock().await.own_numbers.clone()
    }

    #[zbus(property, name = "PowerState")]
    async fn power_state(&self) -> u32 {
        self.props.lock().await.power_state
    }

    #[zbus(property, name = "SupportedModes")]
    async fn supported_modes(&self) -> Vec<(u32, u32)> {
        self.props.lock().await.supported_modes.clone()
    }

    #[zbus(property, name = "CurrentModes")]
    async fn current_modes(&self) -> (u32, u32) {
        self.props.lock().await.current_modes
    }

    #[zbus(property, name = "SupportedBands")]
    async fn supported_bands(&self) -> Vec<u32> {
        self.props.lock().await.supported_bands.clone()
    }

    #[zbus(property, name = "CurrentBands")]
    async fn current_bands(&self) -> Vec<u32> {
        self.props.lock().await.current_bands.clone()
    }

    #[zbus(property, name = "SupportedIpFamilies")]
    async fn supported_ip_families(&self) -> u32 {
        3
    }
}

#[cfg(test)]
#[path = "modem_test.rs"]
mod modem_test;
