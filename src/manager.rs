//! Manager / Discovery (C6) and Object Exporter (C7): owns the oFono
//! `Manager` proxy, the ModemManager well-known bus name, and the set of
//! currently-exported modem controllers (spec §4.6/§4.7).

use crate::config;
use crate::facade::{cdma::ModemCdma, firmware::Firmware, location::Location, messaging::Messaging, oma::Oma, sar::Sar, signal::Signal, time::Time, ussd::Ussd, voice::Voice};
use crate::modem::{modem_path, sim_path, ModemController};
use crate::ofono::{is_acceptable_modem_path, ManagerProxy, ModemProxy, OFONO_SERVICE};
use anyhow::Context as _;
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::Connection;

const MM_BUS_NAME: &str = "org.freedesktop.ModemManager1";
const MM_MANAGER_PATH: &str = "/org/freedesktop/ModemManager1";
pub const MM_VERSION: &str = "1.22.0";

/// Top-level `org.freedesktop.ModemManager1` Manager object. Holds a handle
/// back to the `Daemon` so `ScanDevices` can genuinely re-trigger a rescan
/// (SPEC_FULL.md §C), not just acknowledge the call.
pub struct ManagerObject {
    daemon: Arc<Daemon>,
}

impl ManagerObject {
    fn new(daemon: Arc<Daemon>) -> Self {
        Self { daemon }
    }
}

#[zbus::interface(name = "org.freedesktop.ModemManager1")]
impl ManagerObject {
    #[zbus(property)]
    async fn version(&self) -> String {
        MM_VERSION.to_string()
    }

    #[zbus(name = "ScanDevices")]
    async fn scan_devices(&self) -> zbus::fdo::Result<()> {
        self.daemon
            .full_rescan()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("{e:#}")))
    }

    #[zbus(name = "SetLogging")]
    async fn set_logging(&self, level: &str) -> zbus::fdo::Result<()> {
        info!("SetLogging({level}) requested by a client; this bridge's own verbosity is controlled by MODEM_DEBUG");
        Ok(())
    }

    #[zbus(name = "ReportKernelEvent")]
    async fn report_kernel_event(&self, _properties: HashMap<String, OwnedValue>) -> zbus::fdo::Result<()> {
        Ok(())
    }

    #[zbus(name = "InhibitDevice")]
    async fn inhibit_device(&self, _uid: &str, _inhibit: bool) -> zbus::fdo::Result<()> {
        Ok(())
    }
}

/// One modem awaiting SIM insertion before it's exported (spec §4.6, SIM-gating).
struct OfflineModem {
    modem_name: String,
    modem_props: HashMap<String, OwnedValue>,
}

pub struct Daemon {
    connection: Connection,
    ofono_manager: Mutex<Option<ManagerProxy<'static>>>,
    modems: Mutex<HashMap<String, ModemController>>,
    offline_modems: Mutex<Vec<OfflineModem>>,
    next_index: Mutex<u64>,
    bearer_counter: Arc<AtomicU64>,
    has_bus: Mutex<bool>,
    modem_added_block: Arc<AtomicBool>,
    rescan_lock: Mutex<()>,
}

impl Daemon {
    pub fn new(connection: Connection) -> Arc<Self> {
        Arc::new(Self {
            connection,
            ofono_manager: Mutex::new(None),
            modems: Mutex::new(HashMap::new()),
            offline_modems: Mutex::new(Vec::new()),
            next_index: Mutex::new(0),
            bearer_counter: Arc::new(AtomicU64::new(0)),
            has_bus: Mutex::new(false),
            modem_added_block: Arc::new(AtomicBool::new(false)),
            rescan_lock: Mutex::new(()),
        })
    }

    /// Exports the Manager object and starts tracking `org.ofono`'s
    /// lifetime on the bus (spec §4.6, "On start").
    pub async fn run(self: &Arc<Self>) -> anyhow::Result<()> {
        self.connection
            .object_server()
            .at(MM_MANAGER_PATH, ManagerObject::new(Arc::clone(self)))
            .await
            .context("failed to export the Manager object")?;

        let dbus = zbus::fdo::DBusProxy::new(&self.connection)
            .await
            .context("failed to build org.freedesktop.DBus proxy")?;

        let has_owner = dbus
            .name_has_owner(zbus::names::BusName::try_from(OFONO_SERVICE)?)
            .await
            .unwrap_or(false);
        if has_owner {
            self.on_ofono_added().await?;
        } else {
            self.on_ofono_removed().await;
        }

        let me = Arc::clone(self);
        let mut owner_changes = dbus.receive_name_owner_changed().await?;
        tokio::spawn(async move {
            while let Some(signal) = owner_changes.next().await {
                let Ok(args) = signal.args() else { continue };
                if args.name().as_str() != OFONO_SERVICE {
                    continue;
                }
                if args.new_owner().as_ref().is_some() {
                    if let Err(e) = me.on_ofono_added().await {
                        warn!("on_ofono_added failed: {e:#}");
                    }
                } else {
                    me.on_ofono_removed().await;
                }
            }
        });

        Ok(())
    }

    async fn on_ofono_added(self: &Arc<Self>) -> anyhow::Result<()> {
        let manager = ManagerProxy::new(&self.connection)
            .await
            .context("failed to build org.ofono.Manager proxy")?;

        if let Ok(mut added) = manager.receive_modem_added().await {
            let me = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(signal) = added.next().await {
                    if let Ok(args) = signal.args() {
                        if let Err(e) = me.on_modem_added(args.path().to_owned(), args.properties().clone()).await {
                            warn!("ModemAdded handling failed: {e:#}");
                        }
                    }
                }
            });
        }
        if let Ok(mut removed) = manager.receive_modem_removed().await {
            let me = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(signal) = removed.next().await {
                    if let Ok(args) = signal.args() {
                        me.on_modem_removed(args.path().as_str()).await;
                    }
                }
            });
        }

        *self.ofono_manager.lock().await = Some(manager);
        self.full_rescan().await
    }

    async fn on_ofono_removed(self: &Arc<Self>) {
        info!("org.ofono is not present on the bus; no modems tracked");
        *self.ofono_manager.lock().await = None;
        let tracked: Vec<ModemController> = self.modems.lock().await.drain().map(|(_, c)| c).collect();
        for controller in tracked {
            self.unexport_modem(&controller).await;
        }
        self.offline_modems.lock().await.clear();
    }

    /// Full rescan (spec §4.6): exclusive via `rescan_lock`, retries until a
    /// non-empty accepted modem list is obtained, SIM-gates when more than
    /// one modem is present.
    pub async fn full_rescan(self: &Arc<Self>) -> anyhow::Result<()> {
        let _guard = self.rescan_lock.lock().await;
        self.modem_added_block.store(true, Ordering::SeqCst);

        let tracked: Vec<ModemController> = self.modems.lock().await.drain().map(|(_, c)| c).collect();
        for controller in tracked {
            self.unexport_modem(&controller).await;
        }
        self.offline_modems.lock().await.clear();

        let manager = self.ofono_manager.lock().await.clone();
        let Some(manager) = manager else {
            self.modem_added_block.store(false, Ordering::SeqCst);
            return Ok(());
        };

        let accepted = loop {
            let all = manager.get_modems().await.context("Manager.GetModems failed")?;
            let mut accepted: Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)> = all
                .into_iter()
                .filter(|(path, _)| is_acceptable_modem_path(path.as_str()))
                .collect();

            if accepted.is_empty() {
                tokio::time::sleep(Duration::from_millis(300)).await;
                continue;
            }

            let mut restart = false;
            for (path, props) in &mut accepted {
                let online = props
                    .get("Online")
                    .and_then(|v| bool::try_from(v.clone()).ok())
                    .unwrap_or(false);
                if online {
                    continue;
                }
                let modem = ModemProxy::builder(&self.connection)
                    .destination(OFONO_SERVICE)?
                    .path(path.clone())?
                    .build()
                    .await
                    .context("failed to build Modem proxy for power-on")?;
                let mut forced = false;
                for attempt in 0..5 {
                    match modem.set_property("Online", &Value::from(true)).await {
                        Ok(()) => {
                            forced = true;
                            break;
                        }
                        Err(e) => {
                            debug!("{path}: SetProperty(Online, true) attempt {attempt} failed: {e:#}");
                            tokio::time::sleep(Duration::from_millis(300)).await;
                        }
                    }
                }
                if !forced {
                    restart = true;
                    break;
                }
                props.insert("Online".to_string(), OwnedValue::try_from(Value::from(true)).unwrap());
            }
            if restart {
                continue;
            }
            break accepted;
        };

        let n = accepted.len();
        let mut gated = Vec::new();
        let mut ready = Vec::new();
        for (path, props) in accepted {
            if n > 1 {
                if let Ok(present) = self.sim_present(&path).await {
                    if should_gate_for_sim(n, present) {
                        gated.push((path, props));
                        continue;
                    }
                }
            }
            ready.push((path, props));
        }

        for (path, props) in ready {
            if let Err(e) = self.export_modem(path.as_str().to_string(), props).await {
                warn!("{path}: export failed: {e:#}");
            }
        }
        for (path, props) in gated {
            self.offline_modems.lock().await.push(OfflineModem {
                modem_name: path.as_str().to_string(),
                modem_props: props,
            });
        }
        for offline in self.offline_modems.lock().await.drain(..).collect::<Vec<_>>() {
            if let Err(e) = self.export_modem(offline.modem_name.clone(), offline.modem_props).await {
                warn!("{}: deferred export failed: {e:#}", offline.modem_name);
            }
        }

        self.modem_added_block.store(false, Ordering::SeqCst);
        self.maybe_request_bus_name().await;
        Ok(())
    }

    async fn sim_present(&self, modem_path: &OwnedObjectPath) -> anyhow::Result<bool> {
        let sim = crate::ofono::SimManagerProxy::builder(&self.connection)
            .destination(OFONO_SERVICE)?
            .path(modem_path.clone())?
            .build()
            .await
            .context("failed to build SimManager proxy")?;
        let props = sim.get_properties().await.context("SimManager.GetProperties failed")?;
        Ok(props
            .get("Present")
            .and_then(|v| bool::try_from(v.clone()).ok())
            .unwrap_or(false))
    }

    async fn on_modem_added(self: &Arc<Self>, path: OwnedObjectPath, props: HashMap<String, OwnedValue>) -> anyhow::Result<()> {
        if self.modem_added_block.load(Ordering::SeqCst) {
            debug!("{path}: ModemAdded dropped, a rescan is in flight");
            return Ok(());
        }
        if self.modems.lock().await.contains_key(path.as_str()) {
            return Ok(());
        }
        self.export_modem(path.as_str().to_string(), props).await
    }

    async fn on_modem_removed(self: &Arc<Self>, path: &str) {
        if let Some(controller) = self.modems.lock().await.remove(path) {
            self.unexport_modem(&controller).await;
        }
    }

    async fn maybe_request_bus_name(self: &Arc<Self>) {
        let mut has_bus = self.has_bus.lock().await;
        if *has_bus || self.modems.lock().await.is_empty() {
            return;
        }
        match self.connection.request_name(MM_BUS_NAME).await {
            Ok(_) => {
                *has_bus = true;
                info!("acquired bus name {MM_BUS_NAME}");
            }
            Err(e) => warn!("failed to request bus name {MM_BUS_NAME}: {e:#}"),
        }
    }

    /// Exports one modem and every interface its object carries before any
    /// projection runs (spec §4.7: "all interfaces present before any
    /// PropertiesChanged").
    async fn export_modem(self: &Arc<Self>, modem_name: String, modem_props: HashMap<String, OwnedValue>) -> anyhow::Result<()> {
        let index = {
            let mut next = self.next_index.lock().await;
            let i = *next;
            *next += 1;
            i
        };

        let modem_proxy = ModemProxy::builder(&self.connection)
            .destination(OFONO_SERVICE)?
            .path(modem_name.clone())?
            .build()
            .await
            .context("failed to build Modem proxy")?;

        let controller = ModemController::new(
            index,
            modem_name.clone(),
            self.connection.clone(),
            modem_proxy,
            Arc::clone(&self.bearer_counter),
        );

        let object_server = self.connection.object_server();
        object_server
            .at(controller.path().clone(), controller.clone())
            .await
            .context("failed to export Modem object")?;
        object_server.at(controller.path().clone(), controller.modem3gpp_facade.clone()).await?;
        object_server.at(controller.path().clone(), Ussd::default()).await?;
        object_server.at(controller.path().clone(), Voice::default()).await?;
        object_server.at(controller.path().clone(), Messaging::default()).await?;
        object_server.at(controller.path().clone(), Location::default()).await?;
        object_server.at(controller.path().clone(), Signal::default()).await?;
        object_server.at(controller.path().clone(), Firmware::default()).await?;
        object_server.at(controller.path().clone(), Sar::default()).await?;
        object_server.at(controller.path().clone(), Oma::default()).await?;
        object_server.at(controller.path().clone(), Time::default()).await?;
        object_server.at(controller.path().clone(), ModemCdma::default()).await?;
        object_server
            .at(sim_path(index), controller.sim_facade.clone())
            .await
            .context("failed to export Sim object")?;

        self.modems.lock().await.insert(modem_name.clone(), controller.clone());

        if let Err(e) = controller.sync_interfaces().await {
            warn!("{modem_name}: initial sync_interfaces failed: {e:#}");
        }
        if let Err(e) = controller.spawn_self_listener().await {
            warn!("{modem_name}: failed to subscribe own PropertyChanged: {e:#}");
        }
        if config::data_enabled() {
            spawn_startup_activation(controller.clone());
        }
        let _ = modem_props;

        info!("{modem_name}: exported as {}", controller.path());
        Ok(())
    }

    async fn unexport_modem(&self, controller: &ModemController) {
        let object_server = self.connection.object_server();
        let _ = object_server.remove::<ModemController, _>(controller.path().clone()).await;
        let _ = object_server.remove::<crate::facade::modem3gpp::Modem3gpp, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Ussd, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Voice, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Messaging, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Location, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Signal, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Firmware, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Sar, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Oma, _>(controller.path().clone()).await;
        let _ = object_server.remove::<Time, _>(controller.path().clone()).await;
        let _ = object_server.remove::<ModemCdma, _>(controller.path().clone()).await;
        let _ = object_server.remove::<crate::facade::sim::Sim, _>(sim_path(controller.index)).await;
        info!("{}: unexported", controller.modem_name);
    }
}

/// Whether a modem with a SIM slot should wait for `SimManager.Present`
/// before being exported (spec §4.6, SIM-gating; only applies once more
/// than one modem is on the bus).
fn should_gate_for_sim(total_modems: usize, sim_present: bool) -> bool {
    total_modems > 1 && !sim_present
}

/// Startup data-context activation (SPEC_FULL.md §C): polls signal strength
/// and activates the modem's first bearer once signal is available,
/// retrying every 2s until it succeeds or the `data` preference flips off.
fn spawn_startup_activation(controller: ModemController) {
    tokio::spawn(async move {
        loop {
            if !config::data_enabled() {
                debug!("{}: data preference turned off, stopping startup activation", controller.modem_name);
                return;
            }
            if controller.signal_strength().await > 0 {
                match controller.activate_first_bearer().await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => warn!("{}: startup bearer activation failed: {e:#}", controller.modem_name),
                }
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    });
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
