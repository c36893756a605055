//! Receive path: a [`Digester`] for the Telit reply grammar, run by
//! [`atat::Ingress`].
//!
//! Unlike the stock `AtDigester`, [`TelitDigester`] hands the whole reply to
//! the command parser, echo included. A frame runs from the first byte after
//! the previous frame up to and including the first terminator. Replies that
//! announce a payload length (`#MQREAD`) are taken by length first, so a
//! terminator inside the payload does not end the frame.

use atat::{DigestResult, Digester, InternalError, ResponseSlot};
use embedded_io_async::{ErrorType, Read};

use crate::command::parser::{find, Cursor};
use crate::command::Urc;
use crate::fmt::Bytes;

/// Byte the modem UART yields when there is nothing to read.
pub const NO_DATA: u8 = 0xFF;

pub const URC_CAPACITY: usize = 1;
pub const URC_SUBSCRIBERS: usize = 1;

pub type UrcChannel = atat::UrcChannel<Urc, URC_CAPACITY, URC_SUBSCRIBERS>;

pub type Ingress<'a, const N: usize> =
    atat::Ingress<'a, TelitDigester<N>, Urc, N, URC_CAPACITY, URC_SUBSCRIBERS>;

const READ_KEYWORD: &[u8] = b"#MQREAD:";
const PAYLOAD_MARKER: &[u8] = b"<<<";

/// Which patterns end a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramingMode {
    /// `"\r\nOK\r\n"` or `"\r\nERROR\r\n"`
    Strict,
    /// Bare `"OK\r\n"` or `"ERROR\r\n"`
    Loose,
}

impl FramingMode {
    const fn terminators(self) -> &'static [&'static [u8]] {
        match self {
            Self::Strict => &[b"\r\nOK\r\n", b"\r\nERROR\r\n"],
            Self::Loose => &[b"OK\r\n", b"ERROR\r\n"],
        }
    }

    /// End of the first terminator in `buf`.
    pub fn frame_end(self, buf: &[u8]) -> Option<usize> {
        self.terminators()
            .iter()
            .filter_map(|t| find(buf, t).map(|pos| pos + t.len()))
            .min()
    }
}

enum Payload {
    None,
    Pending,
    End(usize),
}

/// Locate the length prefixed payload of a `#MQREAD: <id>,<topic>,<len>`
/// header followed by `<<<`.
fn payload(buf: &[u8]) -> Payload {
    let Some(marker) = find(buf, PAYLOAD_MARKER) else {
        return Payload::None;
    };

    let head = &buf[..marker];
    let head = head.strip_suffix(b"\r\n").unwrap_or(head);
    let line = match head.iter().rposition(|&b| b == b'\n') {
        Some(pos) => &head[pos + 1..],
        None => head,
    };
    let Some(fields) = line.strip_prefix(READ_KEYWORD) else {
        return Payload::None;
    };
    let Some(comma) = fields.iter().rposition(|&b| b == b',') else {
        return Payload::None;
    };

    let mut len_field = Cursor::new(&fields[comma + 1..]);
    let len: usize = match len_field.number() {
        Ok(len) if len_field.rest().is_empty() => len,
        _ => return Payload::None,
    };

    let end = marker + PAYLOAD_MARKER.len() + len;
    if buf.len() < end {
        Payload::Pending
    } else {
        Payload::End(end)
    }
}

/// Frames Telit replies for a receive buffer of `N` bytes.
#[derive(Debug, Clone, Copy)]
pub struct TelitDigester<const N: usize> {
    mode: FramingMode,
}

impl<const N: usize> TelitDigester<N> {
    pub const fn new(mode: FramingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    fn incomplete<'a>(&self, buf: &'a [u8]) -> (DigestResult<'a>, usize) {
        if buf.len() < N {
            return (DigestResult::None, 0);
        }
        warn!("Receive buffer overflow, dropping {} bytes", buf.len());
        (DigestResult::Response(Err(InternalError::Read)), buf.len())
    }
}

impl<const N: usize> Digester for TelitDigester<N> {
    fn digest<'a>(&mut self, buf: &'a [u8]) -> (DigestResult<'a>, usize) {
        let idle = buf.iter().take_while(|&&b| b == NO_DATA).count();
        if idle > 0 {
            return (DigestResult::None, idle);
        }

        let search_from = match payload(buf) {
            Payload::None => 0,
            Payload::Pending => return self.incomplete(buf),
            Payload::End(end) => end,
        };

        match self.mode.frame_end(&buf[search_from..]) {
            Some(end) => {
                let end = search_from + end;
                trace!("Frame {}", Bytes(&buf[..end]));
                (DigestResult::Response(Ok(&buf[..end])), end)
            }
            None => self.incomplete(buf),
        }
    }
}

/// Set up the receive path. Run the returned ingress with
/// [`atat::AtatIngress::read_from`] over the UART reader, wrapped in
/// [`SkipNoData`] when the driver can yield [`NO_DATA`].
pub fn new_ingress<'a, const N: usize>(
    mode: FramingMode,
    buf: &'a mut [u8; N],
    res_slot: &'a ResponseSlot<N>,
    urc_channel: &'a UrcChannel,
) -> Ingress<'a, N> {
    atat::Ingress::new(TelitDigester::new(mode), buf, res_slot, urc_channel)
}

/// UART reader that drops [`NO_DATA`] bytes.
pub struct SkipNoData<R> {
    inner: R,
}

impl<R> SkipNoData<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: ErrorType> ErrorType for SkipNoData<R> {
    type Error = R::Error;
}

impl<R: Read> Read for SkipNoData<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        loop {
            let n = self.inner.read(buf).await?;
            if n == 0 {
                return Ok(0);
            }

            let mut kept = 0;
            for i in 0..n {
                if buf[i] != NO_DATA {
                    buf[kept] = buf[i];
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}
