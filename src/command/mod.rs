//! AT commands of the Telit 3G family (HE910/UE910/UL865), the subset used
//! to bring up a packet data session and drive the modem's embedded MQTT
//! client.
//!
//! Every command implements [`atat::AtatCmd`] by hand: it renders
//! `AT<body>\r\n` and parses the whole reply frame produced by
//! [`crate::ingress::TelitDigester`], echo included. The reply grammar lives
//! in [`parser`], each command plugs its fields in through [`ParseReply`].

pub mod mqtt;
pub mod network_service;
pub mod parser;
pub mod psn;

use core::fmt::Write as _;

use atat::{AtatCmd, AtatResp, AtatUrc, InternalError};
use heapless::{String, Vec};

use crate::error::Error;
use crate::fmt::Bytes;
use crate::module_timing::response_time;
use parser::Reply;

/// Longest command line, `AT` prefix and line ending included.
pub const MAX_CMD_LEN: usize = 256;

/// Longest command body, without the `AT` prefix and line ending.
pub const MAX_BODY_LEN: usize = MAX_CMD_LEN - 4;

pub type Body = String<MAX_BODY_LEN>;

pub(crate) const RESPONSE_TIMEOUT_MS: u32 = response_time().as_millis() as u32;

/// Field level parsing of a reply frame, after the frame has been received.
pub trait ParseReply: AtatCmd {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<Self::Response, Error>;

    /// Parse a complete frame against the echo of this command.
    fn parse_frame(&self, raw: &[u8]) -> Result<Self::Response, Error> {
        let echo = echo(self)?;
        self.parse_reply(&Reply::new(raw, &echo))
    }
}

/// Response of commands that only answer with the echo and `OK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoResponse;

impl AtatResp for NoResponse {}

/// Unsolicited messages. The command set used here does not enable any.
#[derive(Debug, Clone)]
pub enum Urc {}

impl AtatUrc for Urc {
    type Response = Self;

    fn parse(_resp: &[u8]) -> Option<Self::Response> {
        None
    }
}

struct LineWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl core::fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let end = self.len + s.len();
        let dst = self.buf.get_mut(self.len..end).ok_or(core::fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Render `AT<body>\r\n` into `buf`. Returns 0 when the line does not fit
/// `buf` or [`MAX_CMD_LEN`].
pub(crate) fn write_cmd(buf: &mut [u8], body: core::fmt::Arguments<'_>) -> usize {
    let cap = buf.len().min(MAX_CMD_LEN);
    let mut line = LineWriter {
        buf: &mut buf[..cap],
        len: 0,
    };
    match write!(line, "AT{}\r\n", body) {
        Ok(()) => line.len,
        Err(_) => 0,
    }
}

/// The command line as the modem echoes it, `AT<body>` without line ending.
pub fn echo<Cmd: AtatCmd + ?Sized>(cmd: &Cmd) -> Result<Vec<u8, MAX_CMD_LEN>, Error> {
    let mut line = [0u8; MAX_CMD_LEN];
    let len = cmd.write(&mut line);
    let echo = line[..len]
        .strip_suffix(b"\r\n")
        .ok_or(Error::CommandTooLong)?;
    Vec::from_slice(echo).map_err(|_| Error::CommandTooLong)
}

/// [`AtatCmd::parse`] for the commands of this crate.
pub(crate) fn parse<Cmd: ParseReply>(
    cmd: &Cmd,
    resp: Result<&[u8], InternalError>,
) -> Result<Cmd::Response, atat::Error> {
    let raw = resp.map_err(|e| atat::Error::from(Error::from(e)))?;
    cmd.parse_frame(raw).map_err(|e| {
        debug!("Rejected reply {}: {}", Bytes(raw), e);
        atat::Error::from(e)
    })
}

/// Arbitrary command body, sent verbatim behind `AT`.
#[derive(Debug, Clone)]
pub struct RawCommand<'a> {
    pub body: &'a str,
}

pub const MAX_RAW_REPLY_LEN: usize = 256;

/// Unparsed reply frame of a [`RawCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply(pub Vec<u8, MAX_RAW_REPLY_LEN>);

impl AtatResp for RawReply {}

impl AtatCmd for RawCommand<'_> {
    type Response = RawReply;

    const MAX_LEN: usize = MAX_CMD_LEN;

    const MAX_TIMEOUT_MS: u32 = RESPONSE_TIMEOUT_MS;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_cmd(buf, format_args!("{}", self.body))
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<RawReply, atat::Error> {
        parse(self, resp)
    }
}

impl ParseReply for RawCommand<'_> {
    fn parse_reply(&self, reply: &Reply<'_>) -> Result<RawReply, Error> {
        Vec::from_slice(reply.raw())
            .map(RawReply)
            .map_err(|_| Error::Overflow)
    }
}
