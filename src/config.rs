use embassy_time::Duration;

use crate::command::network_service::types::RegistrationStatus;
use crate::command::psn::types::ContextId;

/// Compile time configuration of the driver.
///
/// Everything the bring-up and session layers decide on (retry budgets,
/// pauses, accepted registration statuses, broker settings) is an
/// associated constant here, with defaults suited to a Telit 3G modem on
/// a public network. Implementors only have to provide the broker
/// settings and the reset primitive.
pub trait CellularConfig<'a> {
    const SERIAL: SerialConfig = SerialConfig::new();

    const CONTEXT_ID: ContextId = ContextId(1);
    /// Access point defined for [`Self::CONTEXT_ID`] during bring-up.
    const APN: Apn<'a> = Apn::Given { name: "super" };

    /// Signal qualities strictly between zero and this value are rejected.
    const SIGNAL_QUALITY_THRESHOLD: u8 = 70;
    const SIGNAL_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(5));

    /// The pause only applies while the modem reports "searching".
    const CARRIER_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(10));
    const CARRIER_ACCEPTED: &'static [RegistrationStatus] = &[
        RegistrationStatus::RegistrationDenied,
        RegistrationStatus::RegisteredRoaming,
    ];

    /// The pause only applies while the modem reports "searching".
    const GPRS_RETRY: RetryPolicy = RetryPolicy::new(20, Duration::from_secs(5));
    const GPRS_ACCEPTED: &'static [RegistrationStatus] = &[
        RegistrationStatus::NotRegistered,
        RegistrationStatus::RegisteredHome,
        RegistrationStatus::RegisteredRoaming,
    ];
    /// Statuses that end the GPRS stage early without registering.
    const GPRS_ABORT: &'static [RegistrationStatus] = &[RegistrationStatus::RegistrationDenied];

    const MQTT_ENABLE_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(5));
    /// A logout is issued between attempts, the pause follows it.
    const MQTT_LOGIN_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(0));
    const LOGOUT_CHECK: LogoutCheck = LogoutCheck::EchoWithoutOk;

    /// Time between announcing a fatal failure and resetting the device.
    const RESET_COUNTDOWN: Duration = Duration::from_secs(3);

    /// Period of the idle message poll, `None` disables it.
    const POLL_INTERVAL: Option<Duration> = None;

    const MQTT: MqttConfig<'a>;

    /// Reset the whole device. Called at most once, after a stage exhausted
    /// its retry budget.
    fn reset_device(&mut self);
}

/// Bounded retry loop of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    pub attempts: u8,
    pub pause: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u8, pause: Duration) -> Self {
        Self { attempts, pause }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Apn<'a> {
    /// Send no `+CGDCONT`. Bring-up then reports the APN as not defined.
    None,
    Given {
        name: &'a str,
    },
}

/// How the `#MQDISC` reply is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogoutCheck {
    /// Success when the echo is present and no `OK` follows within the wait
    /// window.
    #[default]
    EchoWithoutOk,
    /// Standard grammar, echo followed by `OK`.
    EchoAndOk,
}

/// Broker and session settings used by the MQTT-over-AT layer.
#[derive(Debug, Clone)]
pub struct MqttConfig<'a> {
    /// Configure the last will through `#MQWCFG`.
    pub last_will: bool,
    pub server: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// UART framing the modem expects. Setting up the UART is left to the
/// application; these values only describe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: bool,
}

impl SerialConfig {
    /// 115200 8N1 without flow control.
    pub const fn new() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: false,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::TestConfig;

    #[test]
    fn defaults() {
        assert_eq!(SerialConfig::default().baud_rate, 115_200);
        assert_eq!(TestConfig::SERIAL.parity, Parity::None);
        assert_eq!(TestConfig::SIGNAL_QUALITY_THRESHOLD, 70);
        assert_eq!(TestConfig::CARRIER_RETRY.attempts, 3);
        assert_eq!(TestConfig::GPRS_RETRY.attempts, 20);
        assert_eq!(TestConfig::LOGOUT_CHECK, LogoutCheck::EchoWithoutOk);
        assert!(TestConfig::POLL_INTERVAL.is_none());
        assert_eq!(TestConfig::APN, Apn::Given { name: "super" });
    }
}
