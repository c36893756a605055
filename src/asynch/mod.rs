pub mod client;
pub mod control;
pub mod mqtt;
pub mod network;
pub mod runner;
pub mod state;

use atat::asynch::AtatClient;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;

use crate::command::Body;
use crate::config::CellularConfig;
use control::Control;
use runner::Runner;

/// Raw commands that can be queued through [`Control::send_raw`].
pub const PASSTHROUGH_CAPACITY: usize = 2;

pub struct State {
    ch: state::State,
    passthrough: Channel<NoopRawMutex, Body, PASSTHROUGH_CAPACITY>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub const fn new() -> Self {
        Self {
            ch: state::State::new(),
            passthrough: Channel::new(),
        }
    }
}

/// Split the driver into the application [`Control`] handle and the
/// [`Runner`] that owns the AT client.
///
/// `at` is usually an [`atat::asynch::Client`] over the UART transmit half,
/// sharing its response slot with an ingress built by
/// [`crate::ingress::new_ingress`] that a separate task feeds through
/// `read_from`.
pub fn new<'d, AT: AtatClient, C: CellularConfig<'d>>(
    state: &'d mut State,
    at: AT,
    config: C,
) -> (Control<'d>, Runner<'d, AT, C>) {
    let ch = state::Runner::new(&mut state.ch);
    let control = Control::new(ch.clone(), state.passthrough.sender());
    let runner = Runner::new(ch, at, config, state.passthrough.receiver());
    (control, runner)
}
