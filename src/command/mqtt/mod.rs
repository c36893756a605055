//! ### MQTT client commands
//!
//! The Telit 3G firmware ships an MQTT 3.1.1 client driven through the
//! `#MQ*` command set. Each command addresses a client instance, the
//! firmware supports exactly one.

pub mod responses;
pub mod types;

use atat::{AtatCmd, InternalError};
use heapless::{String, Vec};
use responses::{ConnectionStatus, DisconnectStatus, Message, MessageCount};
use types::{InstanceId, QoS};

use super::parser::{find, Cursor, Reply};
use super::{parse, write_cmd, NoResponse, ParseReply, MAX_CMD_LEN, RESPONSE_TIMEOUT_MS};
use crate::error::Error;
use crate::module_timing::mqtt_connect_time;

fn check_instance(fields: &mut Cursor<'_>, id: InstanceId) -> Result<(), Error> {
    let reported = InstanceId(fields.number()?);
    fields.expect(b',')?;
    if reported != id {
        return Err(Error::ProtocolViolation);
    }
    Ok(())
}

/// Enable MQTT client #MQEN
#[derive(Debug, Clone)]
pub struct EnableMqtt {
    pub id: InstanceId,
}

impl AtatCmd for EnableMqtt {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#MQEN={},1", self.id.0))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for EnableMqtt {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Configure last will and testament #MQWCFG
#[derive(Debug, Clone)]
pub struct ConfigureWill {
    pub id: InstanceId,
    pub enabled: bool,
}

impl AtatCmd for ConfigureWill {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(
            buf,
            format_args!("#MQWCFG={},{}", self.id.0, u8::from(self.enabled)),
        )
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for ConfigureWill {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Configure broker connection #MQCFG
///
/// `#MQCFG=<instance>,<hostname>,<port>,<cleanSession>`, always requesting a
/// clean session.
#[derive(Debug, Clone)]
pub struct ConfigureMqtt<'a> {
    pub id: InstanceId,
    pub server: &'a str,
    pub port: u16,
}

impl AtatCmd for ConfigureMqtt<'_> {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(
            buf,
            format_args!("#MQCFG={},{},{},1", self.id.0, self.server, self.port),
        )
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for ConfigureMqtt<'_> {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Connect and log in #MQCONN
///
/// The broker handshake runs inside the modem, the reply arrives late or not
/// at all. Use [`GetConnectionStatus`] to learn the outcome.
#[derive(Debug, Clone)]
pub struct Connect<'a> {
    pub id: InstanceId,
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl AtatCmd for Connect<'_> {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = mqtt_connect_time().as_millis() as u32;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(
            buf,
            format_args!(
                "#MQCONN={},{},{},{}",
                self.id.0, self.client_id, self.username, self.password
            ),
        )
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for Connect<'_> {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Connection status #MQCONN?
///
/// `#MQCONN: <instance>,<state>`, state 1 means connected.
#[derive(Debug, Clone)]
pub struct GetConnectionStatus {
    pub id: InstanceId,
}

impl AtatCmd for GetConnectionStatus {
    type Response = ConnectionStatus;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#MQCONN?"))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<ConnectionStatus, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for GetConnectionStatus {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<ConnectionStatus, Error> {
        let mut fields = reply.keyword(b"#MQCONN:")?;
        check_instance(&mut fields, self.id)?;
        let state = fields.number::<u8>()?.into();
        Ok(ConnectionStatus { id: self.id, state })
    }
}

/// Disconnect from the broker #MQDISC
///
/// The firmware's confirmation does not follow the usual grammar, so the
/// reply is not judged here. See [`DisconnectStatus`].
#[derive(Debug, Clone)]
pub struct Disconnect {
    pub id: InstanceId,
}

impl AtatCmd for Disconnect {
    type Response = DisconnectStatus;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#MQDISC={}", self.id.0))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<DisconnectStatus, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for Disconnect {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<DisconnectStatus, Error> {
        Ok(DisconnectStatus {
            echo: reply.has_echo(),
            terminator: reply.terminator(),
        })
    }
}

/// Subscribe to a topic #MQSUB
#[derive(Debug, Clone)]
pub struct Subscribe<'a> {
    pub id: InstanceId,
    pub topic: &'a str,
}

impl AtatCmd for Subscribe<'_> {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#MQSUB={},{}", self.id.0, self.topic))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for Subscribe<'_> {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Publish a string message #MQPUBS
///
/// `#MQPUBS=<instance>,<topic>,<retain>,<qos>,<message>`
#[derive(Debug, Clone)]
pub struct PublishString<'a> {
    pub id: InstanceId,
    pub topic: &'a str,
    pub retain: bool,
    pub qos: QoS,
    pub payload: &'a str,
}

impl AtatCmd for PublishString<'_> {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(
            buf,
            format_args!(
                "#MQPUBS={},{},{},{},{}",
                self.id.0,
                self.topic,
                u8::from(self.retain),
                self.qos as u8,
                self.payload
            ),
        )
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for PublishString<'_> {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Number of received messages waiting in the modem #MQREAD?
///
/// `#MQREAD: <instance>,<count>`
#[derive(Debug, Clone)]
pub struct GetMessageCount {
    pub id: InstanceId,
}

impl AtatCmd for GetMessageCount {
    type Response = MessageCount;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#MQREAD?"))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<MessageCount, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for GetMessageCount {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<MessageCount, Error> {
        let mut fields = reply.keyword(b"#MQREAD:")?;
        check_instance(&mut fields, self.id)?;
        let count = fields.number()?;
        Ok(MessageCount { id: self.id, count })
    }
}

/// Read a received message #MQREAD=
///
/// The reply header `#MQREAD: <instance>,<topic>,<len>` is followed by the
/// `<<<` prompt and exactly `<len>` payload bytes. The payload is taken by
/// length, it may contain commas, line endings or `<`.
#[derive(Debug, Clone)]
pub struct ReadMessage {
    pub id: InstanceId,
    pub index: u8,
}

impl AtatCmd for ReadMessage {
    type Response = Message;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#MQREAD={},{}", self.id.0, self.index))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<Message, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for ReadMessage {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<Message, Error> {
        let mut fields = reply.keyword_raw(b"#MQREAD:")?;
        check_instance(&mut fields, self.id)?;

        // The topic may contain commas, the length is the last field.
        let header = fields.until(b"\r\n")?;
        let split = header
            .iter()
            .rposition(|&b| b == b',')
            .ok_or(Error::MalformedField)?;
        let mut len_field = Cursor::new(&header[split + 1..]);
        let len: usize = len_field.number()?;
        if !len_field.rest().is_empty() {
            return Err(Error::MalformedField);
        }
        let topic =
            core::str::from_utf8(&header[..split]).map_err(|_| Error::MalformedField)?;

        fields.skip_past(b"<<<")?;
        let payload = fields.take(len)?;

        // The status line must come after the payload, not inside it.
        if find(fields.rest(), b"OK\r\n").is_none() {
            return Err(Error::Incomplete);
        }

        let mut message = Message {
            topic: String::new(),
            payload: Vec::new(),
        };
        message
            .topic
            .push_str(topic)
            .map_err(|_| Error::MalformedField)?;
        message
            .payload
            .extend_from_slice(payload)
            .map_err(|_| Error::Overflow)?;
        Ok(message)
    }
}
