//! `org.freedesktop.ModemManager1.Modem.Modem3gpp.Ussd`, grounded on
//! `mm_modem_3gpp_ussd.py`'s session state machine — the one façade with a
//! genuine (if tiny) state machine rather than a pure property mirror.

use crate::mm_error::MmError;
use tokio::sync::Mutex;

/// `MMModem3gppUssdSessionState`.
pub const USSD_STATE_IDLE: u32 = 0;
pub const USSD_STATE_ACTIVE: u32 = 1;
pub const USSD_STATE_USER_RESPONSE: u32 = 2;

pub struct Ussd {
    state: Mutex<u32>,
}

impl Default for Ussd {
    fn default() -> Self {
        Self { state: Mutex::new(USSD_STATE_IDLE) }
    }
}

#[zbus::interface(name = "org.freedesktop.ModemManager1.Modem.Modem3gpp.Ussd")]
impl Ussd {
    #[zbus(property)]
    async fn state(&self) -> u32 {
        *self.state.lock().await
    }

    #[zbus(property, name = "NetworkNotification")]
    async fn network_notification(&self) -> String {
        String::new()
    }

    #[zbus(property, name = "NetworkRequest")]
    async fn network_request(&self) -> String {
        String::new()
    }

    async fn initiate(&self, command: &str) -> Result<String, MmError> {
        let mut state = self.state.lock().await;
        if *state == USSD_STATE_ACTIVE || *state == USSD_STATE_USER_RESPONSE {
            return Err(MmError::WrongState(format!(
                "a USSD session is already in progress (command {command:?} rejected)"
            )));
        }
        *state = USSD_STATE_USER_RESPONSE;
        Ok(String::new())
    }

    async fn respond(&self, _response: &str) -> Result<String, MmError> {
        let mut state = self.state.lock().await;
        if *state == USSD_STATE_IDLE {
            return Err(MmError::WrongState("no USSD session is active".into()));
        }
        *state = USSD_STATE_IDLE;
        Ok(String::new())
    }

    async fn cancel(&self) -> Result<(), MmError> {
        *self.state.lock().await = USSD_STATE_IDLE;
        Ok(())
    }
}
