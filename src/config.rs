//! CLI flags, `MODEM_DEBUG`, and the boolean user-preference file this
//! bridge reads the "data enabled" toggle from (spec §1, out-of-scope
//! collaborator referenced as a shared on-disk preference).

use std::path::{Path, PathBuf};

/// `-v/--verbose -V/--version -h/--help`, matching the original's
/// `ArgumentParser` flag set one-for-one.
#[derive(Debug, clap::Parser)]
#[command(
    name = "modemmanager-bridge",
    version = "1.22.0",
    about = "DBus system service to control mobile broadband modems through oFono."
)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// `MODEM_DEBUG=true` forces verbose regardless of `--verbose` or build
/// profile (spec §6).
pub fn verbose_requested(cli: &Cli) -> bool {
    std::env::var("MODEM_DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
        || cli.verbose
}

fn preference_path() -> PathBuf {
    std::env::var_os("MODEM_PREFERENCES_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/lib/modemmanager-bridge/preferences"))
}

/// Reads a single `key=value` boolean preference, `False` if the file or key
/// is absent. Mirrors the original's `read_setting('data')` convention.
pub fn read_bool_setting(key: &str) -> bool {
    read_bool_setting_at(&preference_path(), key)
}

fn read_bool_setting_at(path: &Path, key: &str) -> bool {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return false;
    };
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Whether the startup data-context activation loop should run for a
/// freshly exported modem (spec SPEC_FULL.md §C).
pub fn data_enabled() -> bool {
    read_bool_setting("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_false() {
        assert!(!read_bool_setting_at(Path::new("/nonexistent/modemmanager-bridge-test"), "data"));
    }

    #[test]
    fn parses_true_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences");
        std::fs::write(&path, "data=True\nother=False\n").unwrap();
        assert!(read_bool_setting_at(&path, "data"));
        assert!(!read_bool_setting_at(&path, "other"));
    }

    #[test]
    fn unknown_key_reads_as_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences");
        std::fs::write(&path, "data=True\n").unwrap();
        assert!(!read_bool_setting_at(&path, "roaming"));
    }

    #[test]
    fn finds_key_regardless_of_line_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences");
        std::fs::write(&path, "other=False\ndata=True\n").unwrap();
        assert!(read_bool_setting_at(&path, "data"));
    }
}
