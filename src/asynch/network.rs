//! Network bring-up: signal, circuit switched registration, packet switched
//! registration and attach, then PDP context definition and activation.
//!
//! Every stage runs a bounded retry loop whose budget, pause and accepted
//! statuses come from [`CellularConfig`]. Only the signal and carrier stages
//! can end the bring-up: exhausting them resets the device. Everything after
//! that is best effort and only logged.

use atat::asynch::AtatClient;
use embassy_time::Timer;
use no_std_net::Ipv4Addr;

use super::client::AtHandle;
use super::state;
use crate::command::network_service::types::RegistrationStatus;
use crate::command::network_service::{GetNetworkRegistrationStatus, GetSignalQuality};
use crate::command::psn::types::{GPRSAttachedState, PDPType};
use crate::command::psn::{
    GetGPRSAttached, GetGPRSNetworkRegistrationStatus, SetPDPContextActivation,
    SetPDPContextDefinition,
};
use crate::config::{Apn, CellularConfig};
use crate::error::Error;

/// Step of the driver that can fail fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    SignalQuality,
    CarrierRegistration,
    MqttEnable,
    MqttLogin,
    Subscribe,
    MessageCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpState {
    Idle,
    CheckSignal,
    CheckCarrierRegistration,
    CheckGprsRegistration,
    CheckGprsAttach,
    DefineApn,
    ActivatePdp,
    Ready,
    Fatal,
}

/// Outcome of the best effort stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkInfo {
    pub gprs_registered: bool,
    pub gprs_attached: bool,
    pub apn_defined: bool,
    /// Address of the activated PDP context
    pub ip: Option<Ipv4Addr>,
}

/// Signal quality is rejected only when strictly between zero and the
/// threshold. Zero is let through, the modem uses it for "not yet known".
pub fn signal_acceptable(quality: u8, threshold: u8) -> bool {
    !(quality > 0 && quality < threshold)
}

/// Announce the failure, give the log a moment to drain and reset the
/// device.
pub(crate) async fn fatal<'d, C: CellularConfig<'d>>(config: &mut C, stage: Stage) -> Error {
    error!(
        "{:?} failed, resetting in {} ms",
        stage,
        C::RESET_COUNTDOWN.as_millis()
    );
    Timer::after(C::RESET_COUNTDOWN).await;
    config.reset_device();
    Error::Fatal(stage)
}

pub struct NetworkBringUp<'r, 'd, AT: AtatClient, C: CellularConfig<'d>> {
    at: AtHandle<'r, AT>,
    config: &'r mut C,
    ch: &'r state::Runner<'d>,
}

impl<'r, 'd, AT: AtatClient, C: CellularConfig<'d>> NetworkBringUp<'r, 'd, AT, C> {
    pub fn new(at: &'r mut AT, config: &'r mut C, ch: &'r state::Runner<'d>) -> Self {
        Self {
            at: AtHandle(at),
            config,
            ch,
        }
    }

    /// Run all stages in order.
    pub async fn run(&mut self) -> Result<NetworkInfo, Error> {
        self.ch.set_bring_up_state(BringUpState::CheckSignal);
        self.process_signal_quality().await?;

        self.ch
            .set_bring_up_state(BringUpState::CheckCarrierRegistration);
        self.process_carrier_registration().await?;

        self.ch.set_bring_up_state(BringUpState::CheckGprsRegistration);
        let gprs_registered = self.process_gprs_registration().await;

        self.ch.set_bring_up_state(BringUpState::CheckGprsAttach);
        let gprs_attached = self.process_gprs_attach().await;

        self.ch.set_bring_up_state(BringUpState::DefineApn);
        let apn_defined = self.process_define_apn().await;

        self.ch.set_bring_up_state(BringUpState::ActivatePdp);
        let ip = self.process_activate_pdp().await;
        self.ch.set_ip(ip);

        self.ch.set_bring_up_state(BringUpState::Ready);
        Ok(NetworkInfo {
            gprs_registered,
            gprs_attached,
            apn_defined,
            ip,
        })
    }

    async fn fatal(&mut self, stage: Stage) -> Error {
        self.ch.set_bring_up_state(BringUpState::Fatal);
        fatal(self.config, stage).await
    }

    pub async fn check_signal_quality(&mut self) -> Result<bool, Error> {
        let sq = self.at.send(&GetSignalQuality).await?;
        debug!("Signal quality: rssi {}, ber {}", sq.rssi, sq.ber);
        Ok(signal_acceptable(sq.rssi, C::SIGNAL_QUALITY_THRESHOLD))
    }

    pub async fn process_signal_quality(&mut self) -> Result<(), Error> {
        let policy = C::SIGNAL_RETRY;
        for attempt in 1..=policy.attempts {
            info!("Checking signal quality... ({})", attempt);
            match self.check_signal_quality().await {
                Ok(true) => {
                    info!("Signal quality is good");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => warn!("Signal quality check failed: {:?}", e),
            }
            info!("Waiting {} ms", policy.pause.as_millis());
            Timer::after(policy.pause).await;
        }

        error!("Signal quality is bad, check the antenna");
        Err(self.fatal(Stage::SignalQuality).await)
    }

    pub async fn check_carrier_registration(&mut self) -> Result<RegistrationStatus, Error> {
        let status = self.at.send(&GetNetworkRegistrationStatus).await?;
        debug!("Carrier registration: {:?}", status.stat);
        Ok(status.stat)
    }

    /// Fatal only when the modem is still searching on the last attempt. Any
    /// other unaccepted status is retried without a pause, and running out of
    /// attempts that way is not an error.
    pub async fn process_carrier_registration(&mut self) -> Result<(), Error> {
        let policy = C::CARRIER_RETRY;
        for attempt in 1..=policy.attempts {
            info!("Checking carrier registration... ({})", attempt);
            match self.check_carrier_registration().await {
                Ok(stat) if C::CARRIER_ACCEPTED.contains(&stat) => {
                    info!("Carrier registration check completed");
                    return Ok(());
                }
                Ok(RegistrationStatus::Searching) => {
                    if attempt == policy.attempts {
                        error!("Carrier registration could not be completed");
                        return Err(self.fatal(Stage::CarrierRegistration).await);
                    }
                    info!("Waiting {} ms", policy.pause.as_millis());
                    Timer::after(policy.pause).await;
                }
                Ok(stat) => warn!("Carrier registration status {} not handled", stat.code()),
                Err(e) => warn!("Carrier registration check failed: {:?}", e),
            }
        }

        warn!("Carrier registration not confirmed, continuing");
        Ok(())
    }

    pub async fn check_gprs_registration(&mut self) -> Result<RegistrationStatus, Error> {
        let status = self.at.send(&GetGPRSNetworkRegistrationStatus).await?;
        debug!("GPRS registration: {:?}", status.stat);
        Ok(status.stat)
    }

    /// Returns whether an accepted status was seen.
    pub async fn process_gprs_registration(&mut self) -> bool {
        let policy = C::GPRS_RETRY;
        for attempt in 1..=policy.attempts {
            info!("Checking GPRS registration... ({})", attempt);
            match self.check_gprs_registration().await {
                Ok(stat) if C::GPRS_ACCEPTED.contains(&stat) => {
                    info!("GPRS registration check completed");
                    return true;
                }
                Ok(stat) if C::GPRS_ABORT.contains(&stat) => {
                    warn!("GPRS registration status {} not handled, giving up", stat.code());
                    return false;
                }
                Ok(RegistrationStatus::Searching) => {
                    info!("Waiting {} ms", policy.pause.as_millis());
                    Timer::after(policy.pause).await;
                }
                Ok(stat) => warn!("GPRS registration status {} not handled", stat.code()),
                Err(e) => warn!("GPRS registration check failed: {:?}", e),
            }
        }

        warn!("GPRS registration not confirmed, continuing");
        false
    }

    pub async fn check_gprs_attach(&mut self) -> Result<bool, Error> {
        let attached = self.at.send(&GetGPRSAttached).await?;
        Ok(attached.state == GPRSAttachedState::Attached)
    }

    pub async fn process_gprs_attach(&mut self) -> bool {
        info!("Checking GPRS attach...");
        match self.check_gprs_attach().await {
            Ok(true) => {
                info!("GPRS attach check completed");
                true
            }
            Ok(false) => {
                warn!("GPRS is detached, continuing");
                false
            }
            Err(e) => {
                warn!("GPRS attach check failed: {:?}", e);
                false
            }
        }
    }

    /// Returns whether a context definition was sent and accepted.
    pub async fn define_apn(&mut self) -> Result<bool, Error> {
        let Apn::Given { name } = C::APN else {
            return Ok(false);
        };
        self.at
            .send(&SetPDPContextDefinition {
                cid: C::CONTEXT_ID,
                pdp_type: PDPType::IP,
                apn: name,
            })
            .await?;
        Ok(true)
    }

    pub async fn process_define_apn(&mut self) -> bool {
        info!("Defining APN...");
        match self.define_apn().await {
            Ok(true) => {
                info!("APN definition success");
                true
            }
            Ok(false) => {
                warn!("No APN configured, context left undefined");
                false
            }
            Err(e) => {
                warn!("APN definition failed: {:?}", e);
                false
            }
        }
    }

    pub async fn activate_pdp(&mut self) -> Result<Ipv4Addr, Error> {
        let res = self
            .at
            .send(&SetPDPContextActivation { cid: C::CONTEXT_ID })
            .await?;
        Ok(res.ip)
    }

    pub async fn process_activate_pdp(&mut self) -> Option<Ipv4Addr> {
        info!("Activating PDP context...");
        match self.activate_pdp().await {
            Ok(ip) => {
                let [a, b, c, d] = ip.octets();
                info!("PDP context activated, address {}.{}.{}.{}", a, b, c, d);
                Some(ip)
            }
            Err(e) => {
                warn!("PDP context could not be activated: {:?}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::asynch::state::State;
    use crate::command::MAX_CMD_LEN;
    use crate::config::MqttConfig;
    use crate::ingress::FramingMode;
    use crate::test_helpers::{TestConfig, TestWire};

    const CSQ_GOOD: &str = "\r\n+CSQ: 76,8\r\n\r\nOK\r\n";
    const CSQ_BAD: &str = "\r\n+CSQ: 45,8\r\n\r\nOK\r\n";

    fn creg(stat: u8) -> std::string::String {
        std::format!("\r\n+CREG: 0,{stat}\r\n\r\nOK\r\n")
    }

    fn cgreg(stat: u8) -> std::string::String {
        std::format!("\r\n+CGREG: 0,{stat}\r\n\r\nOK\r\n")
    }

    #[test]
    fn signal_threshold() {
        assert!(signal_acceptable(76, 70));
        assert!(signal_acceptable(70, 70));
        assert!(signal_acceptable(0, 70));
        assert!(!signal_acceptable(45, 70));
        assert!(!signal_acceptable(1, 70));
        assert!(!signal_acceptable(69, 70));
    }

    #[test]
    fn full_bring_up() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect_reply("+CSQ", CSQ_GOOD)
            .expect_reply("+CREG?", &creg(5))
            .expect_reply("+CGREG?", &cgreg(5))
            .expect_reply("+CGATT?", "\r\n+CGATT: 1\r\n\r\nOK\r\n")
            .expect_ok("+CGDCONT=1,\"IP\",\"super\"")
            .expect_reply("#SGACT=1,1", "\r\n#SGACT: 10.0.0.42\r\n\r\nOK\r\n");

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        let info = wire.run(FramingMode::Loose, bring_up.run()).unwrap();
        assert_eq!(
            info,
            NetworkInfo {
                gprs_registered: true,
                gprs_attached: true,
                apn_defined: true,
                ip: Some(Ipv4Addr::new(10, 0, 0, 42)),
            }
        );
        assert_eq!(ch.bring_up_state(None), BringUpState::Ready);
        assert_eq!(ch.ip(), Some(Ipv4Addr::new(10, 0, 0, 42)));
        assert_eq!(config.resets, 0);
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn bad_signal_is_retried() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect_reply("+CSQ", CSQ_BAD)
            .expect_error("+CSQ")
            .expect_reply("+CSQ", CSQ_GOOD);

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        let res = wire.run(FramingMode::Loose, bring_up.process_signal_quality());
        assert_eq!(res, Ok(()));
        assert_eq!(config.resets, 0);
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn bad_signal_resets_once() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        for _ in 0..3 {
            modem.expect_reply("+CSQ", CSQ_BAD);
        }

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        let res = wire.run(FramingMode::Loose, bring_up.run());
        assert_eq!(res, Err(Error::Fatal(Stage::SignalQuality)));
        assert_eq!(config.resets, 1);
        assert_eq!(ch.bring_up_state(None), BringUpState::Fatal);
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn carrier_searching_until_exhausted_is_fatal() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        for _ in 0..3 {
            modem.expect_reply("+CREG?", &creg(2));
        }

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        let res = wire.run(FramingMode::Loose, bring_up.process_carrier_registration());
        assert_eq!(res, Err(Error::Fatal(Stage::CarrierRegistration)));
        assert_eq!(config.resets, 1);
    }

    #[test]
    fn carrier_unhandled_status_is_soft() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect_reply("+CREG?", &creg(2))
            .expect_reply("+CREG?", &creg(1))
            .expect_error("+CREG?");

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        let res = wire.run(FramingMode::Loose, bring_up.process_carrier_registration());
        assert_eq!(res, Ok(()));
        assert_eq!(config.resets, 0);
    }

    #[test]
    fn gprs_registration_accepts_roaming() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect_reply("+CGREG?", &cgreg(2))
            .expect_reply("+CGREG?", &cgreg(5));

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        assert!(wire.run(FramingMode::Loose, bring_up.process_gprs_registration()));
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn gprs_registration_denied_aborts_softly() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem.expect_reply("+CGREG?", &cgreg(3));

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        assert!(!wire.run(FramingMode::Loose, bring_up.process_gprs_registration()));
        assert_eq!(config.resets, 0);
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn late_stage_failures_are_soft() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect_reply("+CSQ", CSQ_GOOD)
            .expect_reply("+CREG?", &creg(3))
            .expect_reply("+CGREG?", &cgreg(1))
            .expect_reply("+CGATT?", "\r\n+CGATT: 0\r\n\r\nOK\r\n")
            .expect_error("+CGDCONT=1,\"IP\",\"super\"")
            .expect_error("#SGACT=1,1");

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = TestConfig::default();
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        let info = wire.run(FramingMode::Loose, bring_up.run()).unwrap();
        assert_eq!(
            info,
            NetworkInfo {
                gprs_registered: true,
                ..NetworkInfo::default()
            }
        );
        assert_eq!(ch.bring_up_state(None), BringUpState::Ready);
        assert_eq!(config.resets, 0);
    }

    struct MqttOnlyConfig;

    impl<'a> CellularConfig<'a> for MqttOnlyConfig {
        const MQTT: MqttConfig<'a> = MqttConfig {
            last_will: false,
            server: "broker",
            port: 1883,
            client_id: "client",
            username: "user",
            password: "secret",
        };

        fn reset_device(&mut self) {}
    }

    #[test]
    fn apn_is_defined_by_default() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem.expect_ok("+CGDCONT=1,\"IP\",\"super\"");

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = MqttOnlyConfig;
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        assert!(wire.run(FramingMode::Loose, bring_up.process_define_apn()));
        drop(client);
        modem.assert_done();
    }

    struct NoApnConfig;

    impl<'a> CellularConfig<'a> for NoApnConfig {
        const APN: Apn<'a> = Apn::None;
        const MQTT: MqttConfig<'a> = TestConfig::MQTT;

        fn reset_device(&mut self) {}
    }

    #[test]
    fn missing_apn_is_reported_undefined() {
        let wire = TestWire::new();
        let mut modem = wire.modem();

        let mut state = State::new();
        let ch = state::Runner::new(&mut state);
        let mut config = NoApnConfig;
        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);

        let mut bring_up = NetworkBringUp::new(&mut client, &mut config, &ch);
        assert_eq!(wire.run(FramingMode::Loose, bring_up.define_apn()), Ok(false));
        assert!(!wire.run(FramingMode::Loose, bring_up.process_define_apn()));
        drop(client);
        assert!(modem.written().is_empty());
    }
}
