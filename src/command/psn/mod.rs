//! ### Packet Switched Data Services Commands
//!
//! Registration to the packet switched domain, attach state, PDP context
//! definition and activation. On the Telit 3G family the context is
//! activated with the vendor command `#SGACT`, which also makes the modem's
//! embedded IP stack (and with it the MQTT client) use that context.

pub mod responses;
pub mod types;

use atat::{AtatCmd, InternalError};
use responses::{GPRSAttached, GPRSNetworkRegistrationStatus, PDPContextActivation};
use types::{ContextId, GPRSAttachedState, PDPType};

use super::parser::Reply;
use super::{parse, write_cmd, NoResponse, ParseReply, MAX_CMD_LEN, RESPONSE_TIMEOUT_MS};
use crate::error::Error;
use crate::module_timing::context_activation_time;

/// GPRS network registration status +CGREG
///
/// Same grammar as `+CREG`: `+CGREG: <n>,<stat>`.
#[derive(Debug, Clone)]
pub struct GetGPRSNetworkRegistrationStatus;

impl AtatCmd for GetGPRSNetworkRegistrationStatus {
    type Response = GPRSNetworkRegistrationStatus;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("+CGREG?"))
    }

    fn parse(
        &self,
        resp: Result<&[u8], InternalError>,
    ) -> Result<GPRSNetworkRegistrationStatus, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for GetGPRSNetworkRegistrationStatus {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<GPRSNetworkRegistrationStatus, Error> {
        let mut fields = reply.keyword(b"+CGREG:")?;
        let n = fields.number()?;
        fields.expect(b',')?;
        let stat = fields.number::<u8>()?.into();
        Ok(GPRSNetworkRegistrationStatus { n, stat })
    }
}

/// GPRS attach or detach +CGATT
///
/// The read command returns `+CGATT: <state>`, 1 when attached.
#[derive(Debug, Clone)]
pub struct GetGPRSAttached;

impl AtatCmd for GetGPRSAttached {
    type Response = GPRSAttached;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("+CGATT?"))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<GPRSAttached, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for GetGPRSAttached {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<GPRSAttached, Error> {
        let mut fields = reply.keyword(b"+CGATT:")?;
        let state = match fields.number::<u8>()? {
            0 => GPRSAttachedState::Detached,
            1 => GPRSAttachedState::Attached,
            _ => return Err(Error::MalformedField),
        };
        Ok(GPRSAttached { state })
    }
}

/// Define PDP context +CGDCONT
///
/// Specifies the PDP context parameter values for the context identified by
/// `<cid>`.
#[derive(Debug, Clone)]
pub struct SetPDPContextDefinition<'a> {
    pub cid: ContextId,
    pub pdp_type: PDPType,
    pub apn: &'a str,
}

impl AtatCmd for SetPDPContextDefinition<'_> {
    type Response = NoResponse;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(
            buf,
            format_args!(
                "+CGDCONT={},\"{}\",\"{}\"",
                self.cid.0,
                self.pdp_type.as_str(),
                self.apn
            ),
        )
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for SetPDPContextDefinition<'_> {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
        reply.ok().map(|_| NoResponse)
    }
}

/// Context activation #SGACT
///
/// Activates the context `<cid>` and answers with the assigned address,
/// `#SGACT: <a>.<b>.<c>.<d>`. Activation involves the network and can take
/// many seconds.
#[derive(Debug, Clone)]
pub struct SetPDPContextActivation {
    pub cid: ContextId,
}

impl AtatCmd for SetPDPContextActivation {
    type Response = PDPContextActivation;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = context_activation_time().as_millis() as u32;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("#SGACT={},1", self.cid.0))
    }

    fn parse(
        &self,
        resp: Result<&[u8], InternalError>,
    ) -> Result<PDPContextActivation, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for SetPDPContextActivation {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<PDPContextActivation, Error> {
        let ip = reply.keyword(b"#SGACT:")?.ipv4()?;
        Ok(PDPContextActivation { ip })
    }
}
