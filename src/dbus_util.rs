//! Small helpers shared by every exported object (C7).
//!
//! ModemManager clients expect one batched `PropertiesChanged` per
//! projection run, carrying the exact symmetric diff (spec §8) — not one
//! signal per changed property, which is what the per-property setters
//! zbus generates from `#[zbus::interface]` would produce if called in a
//! loop. `emit_properties_changed` goes around that and emits the signal
//! by hand.

use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

pub async fn emit_properties_changed(
    ctxt: &zbus::SignalContext<'_>,
    interface: &str,
    changed: HashMap<String, OwnedValue>,
    invalidated: Vec<String>,
) -> zbus::Result<()> {
    if changed.is_empty() && invalidated.is_empty() {
        return Ok(());
    }
    ctxt.connection()
        .emit_signal(
            Option::<&str>::None,
            ctxt.path(),
            "org.freedesktop.DBus.Properties",
            "PropertiesChanged",
            &(interface, changed, invalidated),
        )
        .await
}
