use crate::asynch::network::Stage;

/// Errors surfaced by the receive path, the transport and the reply parsers.
///
/// Parser level errors are always returned to the calling stage, which owns
/// the retry policy. Only [`Error::Fatal`] means the device reset primitive
/// has already been invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    // Receive path
    /// The receive buffer filled up before a terminator arrived.
    Overflow,
    /// The wait window elapsed without a recognised terminator.
    Timeout,

    // Reply grammar
    /// The echo of the command we sent is not in the reply.
    NoEcho,
    /// The vendor reply keyword is not in the reply.
    NoReply,
    /// Neither `OK` nor `ERROR` terminates the reply.
    Incomplete,
    /// The modem answered with `ERROR`.
    ModemError,
    /// A field was empty, non-numeric, out of range or missing its delimiter.
    MalformedField,
    /// The modem answered with a status we do not accept at this point.
    ProtocolViolation,

    // Transport
    /// The command body does not fit into the command buffer.
    CommandTooLong,
    /// Writing to the UART failed or timed out.
    Write,

    /// A stage exhausted its retry budget and the device was reset.
    Fatal(Stage),
}

impl From<atat::InternalError<'_>> for Error {
    fn from(e: atat::InternalError<'_>) -> Self {
        match e {
            atat::InternalError::Read => Self::Overflow,
            atat::InternalError::Timeout => Self::Timeout,
            atat::InternalError::Write => Self::Write,
            atat::InternalError::Error => Self::ModemError,
            _ => Self::ProtocolViolation,
        }
    }
}

/// Reply grammar errors all collapse into `InvalidResponse` on the way
/// through [`atat::AtatCmd::parse`]. The finer kinds are logged there and
/// remain available from [`crate::command::ParseReply`].
impl From<Error> for atat::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Overflow => Self::Read,
            Error::Timeout => Self::Timeout,
            Error::Write | Error::CommandTooLong => Self::Write,
            Error::ModemError => Self::Error,
            Error::MalformedField => Self::Parse,
            Error::NoEcho | Error::NoReply | Error::Incomplete | Error::ProtocolViolation => {
                Self::InvalidResponse
            }
            Error::Fatal(_) => Self::Aborted,
        }
    }
}

impl From<atat::Error> for Error {
    fn from(e: atat::Error) -> Self {
        match e {
            atat::Error::Read => Self::Overflow,
            atat::Error::Timeout => Self::Timeout,
            atat::Error::Write => Self::Write,
            atat::Error::Error => Self::ModemError,
            atat::Error::Parse => Self::MalformedField,
            atat::Error::InvalidResponse => Self::NoReply,
            _ => Self::ProtocolViolation,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overflow => f.write_str("receive buffer overflow"),
            Self::Timeout => f.write_str("timed out waiting for a reply"),
            Self::NoEcho => f.write_str("command echo not found"),
            Self::NoReply => f.write_str("reply keyword not found"),
            Self::Incomplete => f.write_str("reply has no terminator"),
            Self::ModemError => f.write_str("modem replied ERROR"),
            Self::MalformedField => f.write_str("malformed reply field"),
            Self::ProtocolViolation => f.write_str("unexpected status from modem"),
            Self::CommandTooLong => f.write_str("command too long"),
            Self::Write => f.write_str("UART write failed"),
            Self::Fatal(stage) => write!(f, "fatal failure in stage {:?}", stage),
        }
    }
}
