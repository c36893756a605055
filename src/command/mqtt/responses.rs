//! Responses for MQTT Commands
use atat::AtatResp;
use heapless::{String, Vec};

use super::types::{ConnectionState, InstanceId, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::command::parser::Terminator;

/// Connection status #MQCONN?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionStatus {
    pub id: InstanceId,
    pub state: ConnectionState,
}

/// Pending messages #MQREAD?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageCount {
    pub id: InstanceId,
    pub count: u8,
}

/// Received message #MQREAD=
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

/// Disconnect #MQDISC, as it came back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectStatus {
    /// The command line was echoed
    pub echo: bool,
    pub terminator: Option<Terminator>,
}

impl AtatResp for ConnectionStatus {}

impl AtatResp for MessageCount {}

impl AtatResp for Message {}

impl AtatResp for DisconnectStatus {}
