use atat::asynch::AtatClient;
use atat::AtatCmd;

use crate::command::MAX_CMD_LEN;
use crate::error::Error;

/// Command transport: one request/response exchange at a time over an
/// [`AtatClient`], typically [`atat::asynch::Client`] fed by
/// [`crate::ingress::Ingress`].
pub struct AtHandle<'a, AT: AtatClient>(pub &'a mut AT);

impl<AT: AtatClient> AtHandle<'_, AT> {
    /// Send `cmd` and wait for its reply frame, at most
    /// [`AtatCmd::MAX_TIMEOUT_MS`].
    pub async fn send<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        // The client would send an empty line for a command that does not fit.
        let mut line = [0u8; MAX_CMD_LEN];
        if cmd.write(&mut line) == 0 {
            warn!("Command does not fit {} bytes", MAX_CMD_LEN);
            return Err(Error::CommandTooLong);
        }

        self.0.send(cmd).await.map_err(Error::from)
    }
}

#[cfg(test)]
mod test {
    use atat::InternalError;

    use super::*;
    use crate::command::mqtt::types::InstanceId;
    use crate::command::mqtt::ReadMessage;
    use crate::command::network_service::responses::SignalQuality;
    use crate::command::network_service::GetSignalQuality;
    use crate::command::parser::Reply;
    use crate::command::{parse, write_cmd, NoResponse, ParseReply, RawCommand, MAX_BODY_LEN};
    use crate::ingress::{FramingMode, NO_DATA};
    use crate::test_helpers::{TestWire, Wire};

    const CSQ_REPLY: &[u8] = b"AT+CSQ\r\r\n+CSQ: 76,8\r\n\r\nOK\r\n";

    /// `+CSQ` with a short wait window.
    struct QuickSignalQuality;

    impl AtatCmd for QuickSignalQuality {
        type Response = NoResponse;

        const MAX_LEN: usize = MAX_CMD_LEN;

        const MAX_TIMEOUT_MS: u32 = 50;

        fn write(&self, buf: &mut [u8]) -> usize {
            write_cmd(buf, format_args!("+CSQ"))
        }

        fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<NoResponse, atat::Error> {
            parse(self, resp)
        }
    }

    impl ParseReply for QuickSignalQuality {
        fn parse_reply(&self, reply: &Reply<'_>) -> Result<NoResponse, Error> {
            reply.ok().map(|_| NoResponse)
        }
    }

    #[test]
    fn sends_prefixed_line_and_parses_reply() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem.expect("+CSQ", CSQ_REPLY);

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let sq = wire
            .run(FramingMode::Loose, async {
                AtHandle(&mut client).send(&GetSignalQuality).await
            })
            .unwrap();
        assert_eq!(sq, SignalQuality { rssi: 76, ber: 8 });
        drop(client);

        assert_eq!(modem.written(), b"AT+CSQ\r\n");
        modem.assert_done();
    }

    #[test]
    fn frame_matches_received_bytes() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem.expect("+CSQ", CSQ_REPLY);

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let reply = wire
            .run(FramingMode::Strict, async {
                AtHandle(&mut client).send(&RawCommand { body: "+CSQ" }).await
            })
            .unwrap();
        assert_eq!(reply.0.as_slice(), CSQ_REPLY);
    }

    #[test]
    fn repeated_transactions_are_independent() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect("+CSQ", CSQ_REPLY)
            .expect_reply("+CSQ", "\r\n+CSQ: 45,2\r\n\r\nOK\r\n");

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let (first, second) = wire.run(FramingMode::Loose, async {
            let mut at = AtHandle(&mut client);
            let first = at.send(&GetSignalQuality).await;
            let second = at.send(&GetSignalQuality).await;
            (first, second)
        });
        assert_eq!(first, Ok(SignalQuality { rssi: 76, ber: 8 }));
        assert_eq!(second, Ok(SignalQuality { rssi: 45, ber: 2 }));
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn payload_terminators_stay_in_the_frame() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem
            .expect(
                "#MQREAD=1,1",
                b"AT#MQREAD=1,1\r\r\n#MQREAD: 1,t,11\r\n<<<ab\r\nOK\r\ncdef\r\n\r\nOK\r\n",
            )
            .expect("+CSQ", CSQ_REPLY);

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let (msg, sq) = wire.run(FramingMode::Loose, async {
            let mut at = AtHandle(&mut client);
            let msg = at
                .send(&ReadMessage {
                    id: InstanceId(1),
                    index: 1,
                })
                .await;
            let sq = at.send(&GetSignalQuality).await;
            (msg, sq)
        });

        let msg = msg.unwrap();
        assert_eq!(msg.topic.as_str(), "t");
        assert_eq!(msg.payload.as_slice(), b"ab\r\nOK\r\ncdef");
        assert_eq!(sq, Ok(SignalQuality { rssi: 76, ber: 8 }));
    }

    #[test]
    fn times_out_without_terminator() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem.expect("+CSQ", b"AT+CSQ\r\r\n+CSQ: 76,8\r\n");

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let res = wire.run(FramingMode::Loose, async {
            AtHandle(&mut client).send(&QuickSignalQuality).await
        });
        assert_eq!(res, Err(Error::Timeout));
    }

    #[test]
    fn missing_echo_is_rejected() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        modem.expect("+CSQ", b"\r\n+CSQ: 76,8\r\n\r\nOK\r\n");

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let res = wire.run(FramingMode::Loose, async {
            AtHandle(&mut client).send(&GetSignalQuality).await
        });
        assert!(res.is_err());
    }

    #[test]
    fn overflow_ends_the_wait() {
        let wire = Wire::<16>::new();
        let mut modem = wire.modem();
        modem.expect("+CSQ", CSQ_REPLY);

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let res = wire.run(FramingMode::Loose, async {
            AtHandle(&mut client).send(&GetSignalQuality).await
        });
        assert_eq!(res, Err(Error::Overflow));
    }

    #[test]
    fn reader_drops_no_data_and_reports_overflow() {
        let mut garbage = std::vec![NO_DATA; 40];
        garbage.extend_from_slice(&[b'x'; 32]);

        let mut filled = std::vec::Vec::new();
        for &b in CSQ_REPLY {
            filled.extend_from_slice(&[NO_DATA, b, NO_DATA]);
        }

        let wire = Wire::<32>::new();
        let mut modem = wire.modem();
        modem.expect("+CSQ", &garbage).expect("+CSQ", &filled);

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let (first, second) = wire.run(FramingMode::Loose, async {
            let mut at = AtHandle(&mut client);
            let first = at.send(&GetSignalQuality).await;
            let second = at.send(&GetSignalQuality).await;
            (first, second)
        });
        assert_eq!(first, Err(Error::Overflow));
        assert_eq!(second, Ok(SignalQuality { rssi: 76, ber: 8 }));
        drop(client);
        modem.assert_done();
    }

    #[test]
    fn rejects_oversized_body() {
        let wire = TestWire::new();
        let mut modem = wire.modem();
        let body = "x".repeat(MAX_BODY_LEN + 1);

        let mut buf = [0u8; MAX_CMD_LEN];
        let mut client = wire.client(&mut modem, &mut buf);
        let res = wire.run(FramingMode::Loose, async {
            AtHandle(&mut client).send(&RawCommand { body: &body }).await
        });
        assert_eq!(res.unwrap_err(), Error::CommandTooLong);
        drop(client);
        assert!(modem.written().is_empty());
    }
}
