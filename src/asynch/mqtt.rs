//! Session layer on top of the modem's embedded MQTT client.
//!
//! `Enable -> Configure -> Login -> Subscribe -> (Publish | Count | Read)* ->
//! Logout`. Enabling and logging in retry and reset the device when their
//! budget runs out; the other operations report their outcome and leave the
//! decision to the caller, usually a [`SessionPlan`].

use atat::asynch::AtatClient;
use embassy_time::Timer;

use super::client::AtHandle;
use super::network::{fatal, Stage};
use super::state;
use crate::command::mqtt::responses::{DisconnectStatus, Message};
use crate::command::mqtt::types::{ConnectionState, InstanceId, QoS};
use crate::command::mqtt::{
    ConfigureMqtt, ConfigureWill, Connect, Disconnect, EnableMqtt, GetConnectionStatus,
    GetMessageCount, PublishString, ReadMessage, Subscribe,
};
use crate::command::parser::Terminator;
use crate::config::{CellularConfig, LogoutCheck};
use crate::error::Error;
use crate::fmt::Bytes;

/// Reported by [`MqttSession::login`] and [`MqttSession::new_message_count`]
/// when the modem reply could not be obtained or parsed.
pub const STATUS_UNAVAILABLE: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Disabled,
    Enabled,
    LoggedIn,
    Subscribed,
    LoggedOut,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep<'a> {
    Publish { topic: &'a str, payload: &'a str },
    /// Query the number of waiting messages. With `fatal` set, failing to get
    /// a count resets the device.
    MessageCount { fatal: bool },
    /// Read the first waiting message.
    Read,
}

/// Scripted session run after login.
#[derive(Debug, Clone, Copy)]
pub struct SessionPlan<'a> {
    /// Failing to subscribe resets the device.
    pub subscribe: &'a str,
    pub steps: &'a [SessionStep<'a>],
    pub logout: bool,
}

/// Judge a `#MQDISC` reply.
pub(crate) fn logout_succeeded(check: LogoutCheck, status: &DisconnectStatus) -> bool {
    match check {
        // Inverted on purpose: a disconnect only counts when no OK came back.
        // Likely a latent bug in how the disconnect reply is read rather
        // than modem behaviour. Kept as the default, see LogoutCheck.
        LogoutCheck::EchoWithoutOk => status.echo && status.terminator != Some(Terminator::Ok),
        LogoutCheck::EchoAndOk => status.echo && status.terminator == Some(Terminator::Ok),
    }
}

pub struct MqttSession<'r, 'd, AT: AtatClient, C: CellularConfig<'d>> {
    at: AtHandle<'r, AT>,
    config: &'r mut C,
    ch: &'r state::Runner<'d>,
    id: InstanceId,
}

impl<'r, 'd, AT: AtatClient, C: CellularConfig<'d>> MqttSession<'r, 'd, AT, C> {
    pub fn new(at: &'r mut AT, config: &'r mut C, ch: &'r state::Runner<'d>) -> Self {
        Self {
            at: AtHandle(at),
            config,
            ch,
            id: InstanceId::default(),
        }
    }

    async fn fatal(&mut self, stage: Stage) -> Error {
        self.ch.set_session_state(SessionState::Fatal);
        fatal(self.config, stage).await
    }

    /// `#MQEN`, `#MQWCFG` and `#MQCFG`; stops at the first failure.
    pub async fn enable_and_configure(
        &mut self,
        last_will: bool,
        server: &str,
        port: u16,
    ) -> Result<(), Error> {
        let id = self.id;
        self.at.send(&EnableMqtt { id }).await?;
        self.at
            .send(&ConfigureWill {
                id,
                enabled: last_will,
            })
            .await?;
        self.at.send(&ConfigureMqtt { id, server, port }).await?;
        Ok(())
    }

    pub async fn process_enable(&mut self) -> Result<(), Error> {
        let policy = C::MQTT_ENABLE_RETRY;
        let mqtt = C::MQTT;
        info!("Enabling and configuring MQTT...");

        for attempt in 1..=policy.attempts {
            match self
                .enable_and_configure(mqtt.last_will, mqtt.server, mqtt.port)
                .await
            {
                Ok(()) => {
                    info!("MQTT is enabled and configured");
                    self.ch.set_session_state(SessionState::Enabled);
                    return Ok(());
                }
                Err(e) => warn!("Enabling MQTT failed ({}): {:?}", attempt, e),
            }
            if attempt < policy.attempts {
                Timer::after(policy.pause).await;
            }
        }

        error!("MQTT could not be enabled");
        Err(self.fatal(Stage::MqttEnable).await)
    }

    /// Connect, then ask for the connection state.
    pub async fn try_login(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<ConnectionState, Error> {
        let id = self.id;
        // The outcome is read back through #MQCONN?, this reply only paces us.
        if let Err(e) = self
            .at
            .send(&Connect {
                id,
                client_id,
                username,
                password,
            })
            .await
        {
            debug!("#MQCONN: {:?}", e);
        }

        let status = self.at.send(&GetConnectionStatus { id }).await?;
        Ok(status.state)
    }

    /// Connection state code, 1 when connected, [`STATUS_UNAVAILABLE`] when
    /// it could not be read.
    pub async fn login(&mut self, client_id: &str, username: &str, password: &str) -> u8 {
        match self.try_login(client_id, username, password).await {
            Ok(state) => state.code(),
            Err(e) => {
                warn!("Reading the MQTT connection state failed: {:?}", e);
                STATUS_UNAVAILABLE
            }
        }
    }

    pub async fn process_login(&mut self) -> Result<(), Error> {
        let policy = C::MQTT_LOGIN_RETRY;
        let mqtt = C::MQTT;

        for attempt in 1..=policy.attempts {
            info!("Logging into the MQTT broker... ({})", attempt);
            let status = self
                .login(mqtt.client_id, mqtt.username, mqtt.password)
                .await;
            if status == ConnectionState::Connected.code() {
                info!("Logged in to the MQTT broker");
                self.ch.set_session_state(SessionState::LoggedIn);
                return Ok(());
            }

            warn!("MQTT login failed with status {}", status);
            self.logout().await;
            if attempt < policy.attempts {
                Timer::after(policy.pause).await;
            }
        }

        error!("MQTT login could not be completed");
        Err(self.fatal(Stage::MqttLogin).await)
    }

    /// `#MQDISC`, judged by [`CellularConfig::LOGOUT_CHECK`].
    pub async fn logout(&mut self) -> bool {
        match self.at.send(&Disconnect { id: self.id }).await {
            Ok(status) if logout_succeeded(C::LOGOUT_CHECK, &status) => {
                info!("Logged out from the MQTT broker");
                self.ch.set_session_state(SessionState::LoggedOut);
                true
            }
            Ok(status) => {
                warn!("MQTT logout not confirmed: {:?}", status);
                false
            }
            Err(e) => {
                warn!("MQTT logout failed: {:?}", e);
                false
            }
        }
    }

    pub async fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.at.send(&Subscribe { id: self.id, topic }).await?;
        self.ch.set_session_state(SessionState::Subscribed);
        Ok(())
    }

    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), Error> {
        self.at
            .send(&PublishString {
                id: self.id,
                topic,
                retain: false,
                qos: QoS::AtMostOnce,
                payload,
            })
            .await?;
        Ok(())
    }

    pub async fn try_new_message_count(&mut self) -> Result<u8, Error> {
        let res = self.at.send(&GetMessageCount { id: self.id }).await?;
        Ok(res.count)
    }

    /// Number of waiting messages, [`STATUS_UNAVAILABLE`] when it could not
    /// be read.
    pub async fn new_message_count(&mut self) -> u8 {
        match self.try_new_message_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Reading the message count failed: {:?}", e);
                STATUS_UNAVAILABLE
            }
        }
    }

    pub async fn read_message(&mut self, index: u8) -> Result<Message, Error> {
        self.at.send(&ReadMessage { id: self.id, index }).await
    }

    pub async fn read_queued_message(&mut self) -> Result<Message, Error> {
        self.read_message(1).await
    }

    /// Subscribe, run the steps in order and optionally log out.
    pub async fn run_plan(&mut self, plan: &SessionPlan<'_>) -> Result<(), Error> {
        info!("Subscribing to {}", plan.subscribe);
        if let Err(e) = self.subscribe(plan.subscribe).await {
            error!("Failed to subscribe: {:?}", e);
            return Err(self.fatal(Stage::Subscribe).await);
        }
        info!("Subscribed to the topic");

        for step in plan.steps {
            match *step {
                SessionStep::Publish { topic, payload } => {
                    info!("Publishing {} to {}", payload, topic);
                    if let Err(e) = self.publish(topic, payload).await {
                        warn!("Publishing failed: {:?}", e);
                    }
                }
                SessionStep::MessageCount { fatal } => {
                    let count = self.new_message_count().await;
                    if count == STATUS_UNAVAILABLE && fatal {
                        error!("Something went wrong with the MQTT broker");
                        return Err(self.fatal(Stage::MessageCount).await);
                    }
                    info!("There are {} messages in queue", count);
                }
                SessionStep::Read => self.log_queued_message().await,
            }
        }

        if plan.logout {
            self.logout().await;
        }
        Ok(())
    }

    /// Read the first waiting message and log it.
    pub async fn log_queued_message(&mut self) {
        match self.read_queued_message().await {
            Ok(msg) => info!("Message on {}: {}", msg.topic.as_str(), Bytes(&msg.payload)),
            Err(e) => warn!("Reading message failed: {:?}", e),
        }
    }
}
