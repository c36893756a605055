//! Scripted modem for unit tests.

use core::convert::Infallible;
use core::future::Future;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use atat::asynch::Client;
use atat::{AtatIngress, ResponseSlot};
use embassy_futures::block_on;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_time::Duration;
use embedded_io_async::{ErrorType, Read, Write};

use crate::config::{CellularConfig, MqttConfig, RetryPolicy};
use crate::ingress::{new_ingress, FramingMode, SkipNoData, UrcChannel};

pub const INGRESS_BUF_SIZE: usize = 512;
const PIPE_SIZE: usize = 1024;

pub type RxPipe = Pipe<NoopRawMutex, PIPE_SIZE>;

pub type TestClient<'a, 'w, const N: usize> = Client<'a, &'a mut MockModem<'w>, N>;

pub type TestWire = Wire<INGRESS_BUF_SIZE>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Both directions of the modem UART plus the atat plumbing between them.
pub struct Wire<const N: usize> {
    rx: RxPipe,
    res_slot: ResponseSlot<N>,
    urc_channel: UrcChannel,
}

impl<const N: usize> Wire<N> {
    pub fn new() -> Self {
        init_logger();
        Self {
            rx: Pipe::new(),
            res_slot: ResponseSlot::new(),
            urc_channel: UrcChannel::new(),
        }
    }

    pub fn modem(&self) -> MockModem<'_> {
        MockModem::new(&self.rx)
    }

    pub fn client<'a, 'w>(
        &'a self,
        modem: &'a mut MockModem<'w>,
        buf: &'a mut [u8],
    ) -> TestClient<'a, 'w, N> {
        Client::new(modem, &self.res_slot, buf, atat::Config::default())
    }

    /// Drive `fut` to completion while an ingress drains the receive side.
    pub fn run<F: Future>(&self, mode: FramingMode, fut: F) -> F::Output {
        let mut buf = [0u8; N];
        let mut ingress = new_ingress(mode, &mut buf, &self.res_slot, &self.urc_channel);
        let rx = SkipNoData::new(PipeReader(&self.rx));

        match block_on(select(fut, ingress.read_from(rx))) {
            Either::First(out) => out,
            Either::Second(never) => never,
        }
    }
}

struct PipeReader<'p>(&'p RxPipe);

impl ErrorType for PipeReader<'_> {
    type Error = Infallible;
}

impl Read for PipeReader<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.0.read(buf).await)
    }
}

struct Exchange {
    body: String,
    reply: Vec<u8>,
}

/// Stands in for the modem. Every complete command line written to it is
/// checked against the next scripted body, and the scripted reply is pushed
/// into the receive pipe.
pub struct MockModem<'w> {
    rx: &'w RxPipe,
    script: VecDeque<Exchange>,
    line: Vec<u8>,
    written: Vec<u8>,
}

impl<'w> MockModem<'w> {
    fn new(rx: &'w RxPipe) -> Self {
        Self {
            rx,
            script: VecDeque::new(),
            line: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Answer `body` with exactly `reply`.
    pub fn expect(&mut self, body: &str, reply: &[u8]) -> &mut Self {
        self.script.push_back(Exchange {
            body: body.into(),
            reply: reply.to_vec(),
        });
        self
    }

    /// Answer `body` with its echo followed by `rest`.
    pub fn expect_reply(&mut self, body: &str, rest: &str) -> &mut Self {
        let reply = std::format!("AT{body}\r{rest}");
        self.expect(body, reply.as_bytes())
    }

    pub fn expect_ok(&mut self, body: &str) -> &mut Self {
        self.expect_reply(body, "\r\nOK\r\n")
    }

    pub fn expect_error(&mut self, body: &str) -> &mut Self {
        self.expect_reply(body, "\r\nERROR\r\n")
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Bodies sent so far, without `AT` and line ending.
    pub fn sent(&self) -> Vec<String> {
        self.written
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| {
                let line = line.strip_prefix(b"AT").unwrap_or(line);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect()
    }

    pub fn assert_done(&self) {
        let left: Vec<&str> = self.script.iter().map(|e| e.body.as_str()).collect();
        assert!(left.is_empty(), "unsent commands: {left:?}");
    }
}

impl ErrorType for MockModem<'_> {
    type Error = Infallible;
}

impl Write for MockModem<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.extend_from_slice(buf);
        self.line.extend_from_slice(buf);

        if self.line.ends_with(b"\r\n") {
            let line = core::mem::take(&mut self.line);
            let body = line
                .strip_prefix(b"AT")
                .and_then(|l| l.strip_suffix(b"\r\n"))
                .expect("command line without AT prefix");
            let body = std::str::from_utf8(body).unwrap();

            let exchange = self
                .script
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected command {body:?}"));
            assert_eq!(body, exchange.body);

            let mut reply = exchange.reply.as_slice();
            while !reply.is_empty() {
                let n = self.rx.try_write(reply).expect("receive pipe full");
                reply = &reply[n..];
            }
        }
        Ok(buf.len())
    }
}

/// Fast pauses and a reset counter, everything else at its default.
#[derive(Default)]
pub struct TestConfig {
    pub resets: usize,
}

const FAST: Duration = Duration::from_millis(1);

impl<'a> CellularConfig<'a> for TestConfig {
    const SIGNAL_RETRY: RetryPolicy = RetryPolicy::new(3, FAST);
    const CARRIER_RETRY: RetryPolicy = RetryPolicy::new(3, FAST);
    const GPRS_RETRY: RetryPolicy = RetryPolicy::new(20, FAST);
    const MQTT_ENABLE_RETRY: RetryPolicy = RetryPolicy::new(3, FAST);
    const MQTT_LOGIN_RETRY: RetryPolicy = RetryPolicy::new(3, FAST);
    const RESET_COUNTDOWN: Duration = FAST;

    const MQTT: MqttConfig<'a> = MqttConfig {
        last_will: false,
        server: "mqtt3.thingspeak.com",
        port: 1883,
        client_id: "client",
        username: "user",
        password: "secret",
    };

    fn reset_device(&mut self) {
        self.resets += 1;
    }
}
