use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Sender;
use no_std_net::Ipv4Addr;

use super::mqtt::SessionState;
use super::network::BringUpState;
use super::state;
use super::PASSTHROUGH_CAPACITY;
use crate::command::Body;
use crate::error::Error;

/// Application side handle: observe progress and hand raw commands to the
/// runner.
pub struct Control<'d> {
    state_ch: state::Runner<'d>,
    passthrough: Sender<'d, NoopRawMutex, Body, PASSTHROUGH_CAPACITY>,
}

impl<'d> Control<'d> {
    pub(crate) fn new(
        state_ch: state::Runner<'d>,
        passthrough: Sender<'d, NoopRawMutex, Body, PASSTHROUGH_CAPACITY>,
    ) -> Self {
        Self {
            state_ch,
            passthrough,
        }
    }

    pub fn bring_up_state(&self) -> BringUpState {
        self.state_ch.bring_up_state(None)
    }

    pub fn session_state(&self) -> SessionState {
        self.state_ch.session_state(None)
    }

    /// Address of the activated PDP context, once bring-up got that far.
    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.state_ch.ip()
    }

    pub async fn wait_for_bring_up_state(&self, ps: BringUpState) {
        self.state_ch.wait_for_bring_up_state(ps).await
    }

    pub async fn wait_for_session_state(&self, ps: SessionState) {
        self.state_ch.wait_for_session_state(ps).await
    }

    /// Queue a raw command body (without `AT`) for the runner. It is sent
    /// verbatim once the runner is idle and the reply is logged. This can
    /// break the driver's view of the modem if the command changes settings
    /// the driver relies on.
    pub async fn send_raw(&self, body: &str) -> Result<(), Error> {
        let mut raw = Body::new();
        raw.push_str(body).map_err(|_| Error::CommandTooLong)?;
        self.passthrough.send(raw).await;
        Ok(())
    }
}
