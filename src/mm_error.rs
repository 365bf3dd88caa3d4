//! D-Bus error replies that must carry a specific ModemManager error name
//! (spec §7). Everything else in this crate propagates `anyhow::Error`;
//! this is the one boundary where the exact D-Bus error domain matters to
//! the caller.

use zbus::DBusError;

#[derive(Debug, DBusError, thiserror::Error)]
#[zbus(prefix = "org.freedesktop.ModemManager1.Error.Core")]
pub enum MmError {
    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("operation invalid in current state: {0}")]
    WrongState(String),

    #[zbus(error)]
    #[error(transparent)]
    ZBus(#[from] zbus::Error),
}
