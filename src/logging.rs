//! `env_logger` setup, in the teacher's `main.rs` style: kernel-style `<n>`
//! priority prefixes so journald files messages under the right severity.

use env_logger::{Builder, Env, Target};
use log::Level;
use std::io::Write;

/// `verbose` is `--verbose`/`MODEM_DEBUG=true` (spec §6); debug builds also
/// default to the crate's own debug-level filter, matching the teacher's
/// `cfg!(debug_assertions)` split.
pub fn init(verbose: bool) {
    let mut builder = if verbose || cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("warn, modemmanager_bridge=debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("warn, modemmanager_bridge=info"))
    };

    builder.format(|buf, record| match record.level() {
        Level::Info => writeln!(buf, "<6>{}: {}", record.target(), record.args()),
        Level::Warn => writeln!(buf, "<4>{}: {}", record.target(), record.args()),
        Level::Error => {
            eprintln!("<3>{}: {}", record.target(), record.args());
            Ok(())
        }
        _ => writeln!(buf, "<7>{}: {}", record.target(), record.args()),
    });

    builder.target(Target::Stdout).init();
}
