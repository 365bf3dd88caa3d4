pub mod bearer;
pub mod config;
pub mod dbus_util;
pub mod facade;
pub mod logging;
pub mod manager;
pub mod mirror;
pub mod mm_error;
pub mod modem;
pub mod network_config;
pub mod ofono;
pub mod projection;
pub mod systemd;
pub mod types;
