use core::future::pending;

use atat::asynch::AtatClient;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::Ticker;

use super::client::AtHandle;
use super::mqtt::{MqttSession, SessionPlan, STATUS_UNAVAILABLE};
use super::network::{NetworkBringUp, NetworkInfo};
use super::state;
use super::PASSTHROUGH_CAPACITY;
use crate::command::{Body, RawCommand};
use crate::config::CellularConfig;
use crate::error::Error;
use crate::fmt::Bytes;

/// Background runner for the Telit modem.
///
/// You must call `.run()` in a background task for the driver to operate.
pub struct Runner<'d, AT: AtatClient, C: CellularConfig<'d>> {
    ch: state::Runner<'d>,
    at: AT,
    config: C,
    passthrough: Receiver<'d, NoopRawMutex, Body, PASSTHROUGH_CAPACITY>,
    ticker: Option<Ticker>,
}

impl<'d, AT: AtatClient, C: CellularConfig<'d>> Runner<'d, AT, C> {
    pub(crate) fn new(
        ch: state::Runner<'d>,
        at: AT,
        config: C,
        passthrough: Receiver<'d, NoopRawMutex, Body, PASSTHROUGH_CAPACITY>,
    ) -> Self {
        Self {
            ch,
            at,
            config,
            passthrough,
            ticker: C::POLL_INTERVAL.map(Ticker::every),
        }
    }

    pub async fn bring_up(&mut self) -> Result<NetworkInfo, Error> {
        NetworkBringUp::new(&mut self.at, &mut self.config, &self.ch)
            .run()
            .await
    }

    pub fn session(&mut self) -> MqttSession<'_, 'd, AT, C> {
        MqttSession::new(&mut self.at, &mut self.config, &self.ch)
    }

    /// Bring the network up, enable and log into MQTT, then run `plan`.
    pub async fn start(&mut self, plan: &SessionPlan<'_>) -> Result<NetworkInfo, Error> {
        let info = self.bring_up().await?;

        let mut session = self.session();
        session.process_enable().await?;
        session.process_login().await?;
        session.run_plan(plan).await?;
        Ok(info)
    }

    /// Handle one idle event: a message poll tick or a passthrough command.
    pub async fn poll_once(&mut self) {
        let Self {
            ticker,
            passthrough,
            ..
        } = &mut *self;

        let tick = async {
            match ticker {
                Some(ticker) => ticker.next().await,
                None => pending().await,
            }
        };

        let event = select(tick, passthrough.receive()).await;
        match event {
            Either::First(()) => self.poll_messages().await,
            Either::Second(body) => self.passthrough(&body).await,
        }
    }

    async fn poll_messages(&mut self) {
        debug!("Polling for new messages");
        let mut session = self.session();
        let count = session.new_message_count().await;
        info!("Message count: {}", count);
        if count != STATUS_UNAVAILABLE {
            session.log_queued_message().await;
        }
    }

    async fn passthrough(&mut self, body: &str) {
        info!("Sending user command: {}", body);
        match AtHandle(&mut self.at).send(&RawCommand { body }).await {
            Ok(reply) => info!("Reply: {}", Bytes(&reply.0)),
            Err(e) => warn!("User command failed: {:?}", e),
        }
    }

    pub async fn idle(&mut self) -> ! {
        loop {
            self.poll_once().await;
        }
    }

    pub async fn run(&mut self, plan: &SessionPlan<'_>) -> ! {
        match self.start(plan).await {
            Ok(_) => info!("Session script done, idling"),
            Err(e) => {
                // Only reached when the reset primitive returned.
                error!("Stopped: {:?}", e);
                pending::<()>().await;
            }
        }
        self.idle().await
    }
}
