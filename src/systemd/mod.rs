use log::info;
use sd_notify::NotifyState;
use std::sync::Once;

/// Tells systemd the daemon is ready, once, right after the Manager object
/// and initial discovery are up (spec §4.6 tail).
pub fn sd_notify_ready() {
    static SD_NOTIFY_ONCE: Once = Once::new();
    SD_NOTIFY_ONCE.call_once(|| {
        info!("notify ready=1");
        let _ = sd_notify::notify(false, &[NotifyState::Ready]);
    });
}
