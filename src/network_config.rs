//! Touchpoint for the external network-configuration daemon (spec §1,
//! out-of-scope collaborator). The original's `simple_set_apn` dials a real
//! NetworkManager connection; here it's only ever logged (SPEC_FULL.md §C).

use log::info;

/// Called once a bearer's `Interface` becomes known. Does not configure
/// anything itself — a real deployment wires this to whatever daemon owns
/// routing for `interface`.
pub fn push_apn(interface: &str, apn: &str) {
    info!("would push apn \"{apn}\" for interface {interface} to the network-configuration daemon");
}
