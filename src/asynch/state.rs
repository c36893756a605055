use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;
use no_std_net::Ipv4Addr;

use super::mqtt::SessionState;
use super::network::BringUpState;

pub struct State {
    shared: Mutex<NoopRawMutex, RefCell<Shared>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                bring_up: BringUpState::Idle,
                session: SessionState::Disabled,
                ip: None,
                state_waker: WakerRegistration::new(),
            })),
        }
    }
}

/// Progress of the bring-up and session state machines
pub struct Shared {
    bring_up: BringUpState,
    session: SessionState,
    ip: Option<Ipv4Addr>,
    state_waker: WakerRegistration,
}

#[derive(Clone)]
pub struct Runner<'d> {
    pub(crate) shared: &'d Mutex<NoopRawMutex, RefCell<Shared>>,
}

impl<'d> Runner<'d> {
    pub fn new(state: &'d mut State) -> Self {
        Self {
            shared: &state.shared,
        }
    }

    pub fn set_bring_up_state(&self, state: BringUpState) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if s.bring_up != state {
                debug!("Bring-up: {:?} -> {:?}", s.bring_up, state);
            }
            s.bring_up = state;
            s.state_waker.wake();
        });
    }

    pub fn bring_up_state(&self, cx: Option<&mut Context>) -> BringUpState {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if let Some(cx) = cx {
                s.state_waker.register(cx.waker());
            }
            s.bring_up
        })
    }

    pub fn set_session_state(&self, state: SessionState) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if s.session != state {
                debug!("MQTT session: {:?} -> {:?}", s.session, state);
            }
            s.session = state;
            s.state_waker.wake();
        });
    }

    pub fn session_state(&self, cx: Option<&mut Context>) -> SessionState {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if let Some(cx) = cx {
                s.state_waker.register(cx.waker());
            }
            s.session
        })
    }

    pub fn set_ip(&self, ip: Option<Ipv4Addr>) {
        self.shared.lock(|s| s.borrow_mut().ip = ip);
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.shared.lock(|s| s.borrow().ip)
    }

    pub async fn wait_for_bring_up_state(&self, ps: BringUpState) {
        if self.bring_up_state(None) == ps {
            return;
        }

        poll_fn(|cx| {
            if self.bring_up_state(Some(cx)) == ps {
                return Poll::Ready(());
            }
            Poll::Pending
        })
        .await
    }

    pub async fn wait_for_session_state(&self, ps: SessionState) {
        if self.session_state(None) == ps {
            return;
        }

        poll_fn(|cx| {
            if self.session_state(Some(cx)) == ps {
                return Poll::Ready(());
            }
            Poll::Pending
        })
        .await
    }
}
