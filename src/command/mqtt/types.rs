//! Argument and parameter types used by MQTT Commands and Responses

pub const MAX_TOPIC_LEN: usize = 128;
pub const MAX_PAYLOAD_LEN: usize = 256;

/// `<instanceNumber>` of the `#MQ*` commands. The modem firmware supports a
/// single client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstanceId(pub u8);

impl Default for InstanceId {
    fn default() -> Self {
        Self(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// `<state>` of `#MQCONN?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Connected,
    /// Any other code. `60` is what the session layer reports when the
    /// reply could not be parsed at all.
    NotConnected(u8),
}

impl From<u8> for ConnectionState {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Connected,
            n => Self::NotConnected(n),
        }
    }
}

impl ConnectionState {
    pub fn code(self) -> u8 {
        match self {
            Self::Connected => 1,
            Self::NotConnected(n) => n,
        }
    }
}
