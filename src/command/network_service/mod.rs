//! ### Network service
pub mod responses;
pub mod types;

use atat::{AtatCmd, InternalError};
use responses::{NetworkRegistrationStatus, SignalQuality};

use super::parser::Reply;
use super::{parse, write_cmd, ParseReply, MAX_CMD_LEN, RESPONSE_TIMEOUT_MS};
use crate::error::Error;

/// Signal quality +CSQ
///
/// Returns the received signal strength indication `<rssi>` and the channel
/// bit error rate `<ber>`. The reply is `+CSQ: <rssi>,<ber>`.
#[derive(Debug, Clone)]
pub struct GetSignalQuality;

impl AtatCmd for GetSignalQuality {
    type Response = SignalQuality;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("+CSQ"))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<SignalQuality, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for GetSignalQuality {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<SignalQuality, Error> {
        let mut fields = reply.keyword(b"+CSQ:")?;
        let rssi = fields.number()?;
        fields.expect(b',')?;
        let ber = fields.number()?;
        Ok(SignalQuality { rssi, ber })
    }
}

/// Network registration status +CREG
///
/// The read command reports the URC mode `<n>` and the circuit switched
/// registration status `<stat>`, as `+CREG: <n>,<stat>`.
#[derive(Debug, Clone)]
pub struct GetNetworkRegistrationStatus;

impl AtatCmd for GetNetworkRegistrationStatus {
    type Response = NetworkRegistrationStatus;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("+CREG?"))
    }

    fn parse(
        &self,
        resp: Result<&[u8], InternalError>,
    ) -> Result<NetworkRegistrationStatus, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for GetNetworkRegistrationStatus {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<NetworkRegistrationStatus, Error> {
        let mut fields = reply.keyword(b"+CREG:")?;
        let n = fields.number()?;
        fields.expect(b',')?;
        let stat = fields.number::<u8>()?.into();
        Ok(NetworkRegistrationStatus { n, stat })
    }
}
