//! # Regbus Client
//!
//! Controller-side sessions for the regbus register-access protocol:
//! encode a request, send it over an injected byte transport, wait for the
//! matching response with a bounded timeout, validate its CRC and surface a
//! typed outcome.
//!
//! ## Transport
//!
//! The session is generic over any `AsyncRead + AsyncWrite + Unpin` duplex
//! channel. Opening and configuring the physical line (port selection, baud
//! rate, parity) is the embedder's job; the session only needs reliable
//! bytes in and out. An in-memory `tokio::io::duplex` works for tests, a
//! `tokio::net::TcpStream` for a networked peripheral.
//!
//! ## Transactions
//!
//! Only one transaction is outstanding at a time; `read` and `write` take
//! `&mut self`, so sequencing is enforced by the borrow checker. The
//! response wait races a timer (default 1000 ms). If the timer wins, the
//! pending transport read is cancelled by dropping its future and the
//! transaction ends in [`TransactionError::Timeout`].
//!
//! Failure propagation is deliberately asymmetric: a failed `read` returns
//! the error to the caller, while a failed `write` is swallowed after being
//! routed to the diagnostic callback. Embedders that need write
//! confirmation read the register back.
//!
//! ## Example
//!
//! ```ignore
//! use regbus_client::Builder;
//!
//! let mut session = Builder::new()
//!     .on_trace(|line| println!("{line}"))
//!     .build();
//! session.attach(transport);
//!
//! session.write(0x0000_1000, 0xdead_beef).await;
//! let value = session.read(0x0000_1000).await?;
//! session.close().await;
//! ```

use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::mem;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use regbus_protocol::parser::ResponseParser;
use regbus_protocol::{Command, Crc, Request, Response, ResponseFrame, TransactionError};

/// Default bound on the wait for a response.
pub const RESPONSE_TIMEOUT_DEFAULT: Duration = Duration::from_millis(1000);

const READ_CHUNK_CAPACITY: usize = 64;

/// A successfully completed register access, reported through the access
/// callback.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessEvent {
    pub op: Command,
    pub addr: u32,
    pub data: u32,
}

type AccessHook = Box<dyn FnMut(AccessEvent) + Send>;
type TraceHook = Box<dyn FnMut(&str) + Send>;

/// Builder to create a [ClientSession] and modify configuration options.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use regbus_client::{Builder, ClientSession};
/// use regbus_protocol::Crc;
///
/// let session: ClientSession<tokio::io::DuplexStream> = Builder::new()
///     .crc(Crc::default())
///     .response_timeout(Duration::from_millis(250))
///     .build();
/// assert!(!session.is_connected());
/// ```
#[derive(Default)]
pub struct Builder {
    crc: Crc,
    response_timeout: Option<Duration>,
    access_hook: Option<AccessHook>,
    trace_hook: Option<TraceHook>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the CRC parameters used to encode requests and validate
    /// responses.
    pub fn crc(mut self, crc: Crc) -> Self {
        self.crc = crc;
        self
    }

    /// Set the bound on the wait for a response.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Register a callback fired on every successful transaction.
    pub fn on_access(mut self, hook: impl FnMut(AccessEvent) + Send + 'static) -> Self {
        self.access_hook = Some(Box::new(hook));
        self
    }

    /// Register a callback fired with a human-readable trace line for every
    /// request sent, every response received and every transaction error.
    pub fn on_trace(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.trace_hook = Some(Box::new(hook));
        self
    }

    pub fn build<T>(self) -> ClientSession<T> {
        ClientSession {
            link: LinkState::Disconnected,
            crc: self.crc,
            response_timeout: self.response_timeout.unwrap_or(RESPONSE_TIMEOUT_DEFAULT),
            access_hook: self.access_hook,
            trace_hook: self.trace_hook,
        }
    }
}

/// Connection state owned by the session. Teardown always goes through
/// `Closing` so a half-closed channel is never observable.
enum LinkState<T> {
    Disconnected,
    Connected(Link<T>),
    Closing,
}

struct Link<T> {
    io: T,
    parser: ResponseParser,
    pending: VecDeque<ResponseFrame>,
}

impl<T: AsyncRead + Unpin> Link<T> {
    /// Read transport chunks into the parser until a complete response
    /// frame is available.
    async fn next_response(&mut self) -> Result<ResponseFrame, TransactionError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let mut chunk = BytesMut::with_capacity(READ_CHUNK_CAPACITY);
            let received = self.io.read_buf(&mut chunk).await?;
            if received == 0 {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "transport closed while awaiting a response",
                )
                .into());
            }
            self.pending.extend(self.parser.feed(&chunk));
        }
    }
}

/// Client session driving one transaction at a time against a peripheral.
///
/// Construct with [`ClientSession::builder`], then [`attach`](Self::attach)
/// a transport.
pub struct ClientSession<T> {
    link: LinkState<T>,
    crc: Crc,
    response_timeout: Duration,
    access_hook: Option<AccessHook>,
    trace_hook: Option<TraceHook>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> ClientSession<T> {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Attach an open duplex channel. A fresh response parser is installed
    /// alongside it; nothing from a previous connection carries over.
    pub fn attach(&mut self, io: T) {
        self.link = LinkState::Connected(Link {
            io,
            parser: ResponseParser::new(),
            pending: VecDeque::new(),
        });
        self.trace("Connected");
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, LinkState::Connected(_))
    }

    /// Tear the connection down and release the channel.
    ///
    /// The write half is shut down first; shutdown failures are suppressed
    /// since the channel is being discarded either way. The session always
    /// ends up `Disconnected`.
    pub async fn close(&mut self) {
        match mem::replace(&mut self.link, LinkState::Closing) {
            LinkState::Connected(mut link) => {
                let _ = link.io.shutdown().await;
                self.link = LinkState::Disconnected;
                self.trace("Disconnected");
            }
            _ => self.link = LinkState::Disconnected,
        }
    }

    /// Write `data` to the register at `addr` and await the
    /// acknowledgement.
    ///
    /// Failures (timeout, checksum mismatch, wrong response kind, no
    /// connection) are routed to the trace callback and then swallowed; the
    /// caller observes success or a silent absence of effect. This
    /// asymmetry with [`read`](Self::read) is part of the protocol
    /// contract.
    pub async fn write(&mut self, addr: u32, data: u32) {
        if let Err(error) = self.transact_write(addr, data).await {
            self.trace(&error.to_string());
        }
    }

    /// Read the register at `addr`.
    ///
    /// Unlike [`write`](Self::write), failures are surfaced to the caller
    /// (after being routed to the trace callback).
    pub async fn read(&mut self, addr: u32) -> Result<u32, TransactionError> {
        match self.transact_read(addr).await {
            Ok(data) => Ok(data),
            Err(error) => {
                self.trace(&error.to_string());
                Err(error)
            }
        }
    }

    async fn transact_write(&mut self, addr: u32, data: u32) -> Result<(), TransactionError> {
        self.send_request(Request::Write { addr, data }).await?;
        let frame = self.await_response().await?;
        self.validate_crc(&frame)?;
        match frame.response {
            Response::Write => {
                self.notify_access(Command::Write, addr, data);
                Ok(())
            }
            Response::Read { .. } => Err(TransactionError::UnexpectedResponse {
                expected: Command::Write,
                received: Command::Read,
            }),
        }
    }

    async fn transact_read(&mut self, addr: u32) -> Result<u32, TransactionError> {
        self.send_request(Request::Read { addr }).await?;
        let frame = self.await_response().await?;
        self.validate_crc(&frame)?;
        match frame.response {
            Response::Read { data } => {
                self.notify_access(Command::Read, addr, data);
                Ok(data)
            }
            Response::Write => Err(TransactionError::UnexpectedResponse {
                expected: Command::Read,
                received: Command::Write,
            }),
        }
    }

    async fn send_request(&mut self, request: Request) -> Result<(), TransactionError> {
        let frame = request.encode(&self.crc);
        self.trace(&format!("Request {}", frame));

        let link = self.link_mut()?;
        link.io.write_all(&frame.bytes).await?;
        Ok(())
    }

    async fn await_response(&mut self) -> Result<ResponseFrame, TransactionError> {
        let timeout = self.response_timeout;
        let link = self.link_mut()?;

        // The response wait and the timer race; if the timer wins, the read
        // future is dropped, which cancels the pending transport read.
        let frame = match time::timeout(timeout, link.next_response()).await {
            Ok(result) => result?,
            Err(_) => return Err(TransactionError::Timeout),
        };

        self.trace(&format!("Response {}", frame));
        Ok(frame)
    }

    fn link_mut(&mut self) -> Result<&mut Link<T>, TransactionError> {
        match &mut self.link {
            LinkState::Connected(link) => Ok(link),
            _ => Err(TransactionError::NotConnected),
        }
    }

    fn validate_crc(&mut self, frame: &ResponseFrame) -> Result<(), TransactionError> {
        // Recompute over the covered bytes and compare with the trailer.
        // The whole-frame-checksums-to-zero shortcut only holds with
        // reflect off, since a reflected pass bit-reverses the trailer.
        let covered = &frame.bytes[..frame.bytes.len() - 1];
        if self.crc.calculate(covered) != frame.crc {
            return Err(TransactionError::ChecksumMismatch);
        }
        Ok(())
    }

    fn notify_access(&mut self, op: Command, addr: u32, data: u32) {
        if let Some(hook) = &mut self.access_hook {
            hook(AccessEvent { op, addr, data });
        }
    }

    fn trace(&mut self, line: &str) {
        log::debug!("{}", line);
        if let Some(hook) = &mut self.trace_hook {
            hook(line);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::DuplexStream;

    #[tokio::test]
    async fn read_without_connection() {
        let mut session: ClientSession<DuplexStream> = Builder::new().build();
        match session.read(0x1000).await {
            Err(TransactionError::NotConnected) => {}
            other => panic!("expected NotConnected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn attach_and_close_transitions() {
        let mut traces = Vec::new();
        let (trace_tx, trace_rx) = std::sync::mpsc::channel::<String>();
        let mut session = Builder::new()
            .on_trace(move |line| {
                let _ = trace_tx.send(line.to_string());
            })
            .build();

        let (near, _far) = tokio::io::duplex(64);
        assert!(!session.is_connected());
        session.attach(near);
        assert!(session.is_connected());
        session.close().await;
        assert!(!session.is_connected());

        while let Ok(line) = trace_rx.try_recv() {
            traces.push(line);
        }
        assert_eq!(traces, ["Connected", "Disconnected"]);
    }

    #[tokio::test]
    async fn close_when_disconnected_is_a_no_op() {
        let mut session: ClientSession<DuplexStream> = Builder::new().build();
        session.close().await;
        assert!(!session.is_connected());
    }
}
