use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::RegisterSpace;
use regbus_protocol::parser::RequestParser;
use regbus_protocol::{Crc, Request, RequestFrame, Response};

const READ_CHUNK_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub crc: Crc,
}

/// Builder to create a [Peripheral] instance and modify configuration
/// options.
///
/// # Example
///
/// ```ignore
/// use regbus_peripheral::peripheral::Builder;
/// use regbus_protocol::Crc;
///
/// let peripheral = Builder::new()
///     .crc(Crc::new(0x00, 0x07, false))
///     .build(registers, transport);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the CRC parameters used to encode responses.
    pub fn crc(mut self, crc: Crc) -> Self {
        self.config.crc = crc;
        self
    }

    /// Build and return the peripheral.
    pub fn build<S, T>(self, registers: S, io: T) -> Peripheral<S, T>
    where
        S: RegisterSpace,
        T: AsyncRead + AsyncWrite + Unpin,
    {
        Peripheral::with_config(registers, io, self.config)
    }
}

/// Responder loop serving a register space over a duplex byte channel.
#[derive(Debug)]
pub struct Peripheral<S, T> {
    registers: S,
    io: T,
    parser: RequestParser,
    crc: Crc,
}

impl<S: RegisterSpace, T: AsyncRead + AsyncWrite + Unpin> Peripheral<S, T> {
    pub fn new(registers: S, io: T) -> Peripheral<S, T> {
        Peripheral::with_config(registers, io, Config::default())
    }

    pub fn with_config(registers: S, io: T, config: Config) -> Peripheral<S, T> {
        Peripheral {
            registers,
            io,
            parser: RequestParser::new(),
            crc: config.crc,
        }
    }

    /// Serve requests until the transport signals end-of-stream.
    ///
    /// Incomplete and malformed input produces no response; the parser
    /// resynchronizes and the loop waits for more bytes. Returns the
    /// register space so callers can inspect the final state.
    pub async fn serve(mut self) -> io::Result<S> {
        log::info!("Peripheral serving");

        let mut chunk = BytesMut::with_capacity(READ_CHUNK_CAPACITY);
        loop {
            chunk.clear();
            let received = self.io.read_buf(&mut chunk).await?;
            if received == 0 {
                log::info!("Transport closed, peripheral stopping");
                return Ok(self.registers);
            }

            let frames = self.parser.feed(&chunk);
            for frame in frames {
                self.process_request(frame).await?;
            }
        }
    }

    async fn process_request(&mut self, frame: RequestFrame) -> io::Result<()> {
        log::debug!("Received request: {}", frame);

        let response = match frame.request {
            Request::Write { addr, data } => {
                self.registers.store(addr, data);
                Response::Write
            }
            Request::Read { addr } => Response::Read {
                data: self.registers.load(addr),
            },
        };

        let encoded = response.encode(&self.crc);
        log::debug!("Sending response: {}", encoded);
        self.io.write_all(&encoded.bytes).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::SparseRegisters;

    #[tokio::test]
    async fn serve_stops_on_end_of_stream() {
        let (near, far) = tokio::io::duplex(256);
        let peripheral = Peripheral::new(SparseRegisters::seeded(1), far);

        drop(near);
        let registers = peripheral.serve().await.unwrap();
        assert!(registers.is_empty());
    }

    #[tokio::test]
    async fn write_request_populates_the_map() {
        let (mut near, far) = tokio::io::duplex(256);
        let peripheral = Peripheral::new(SparseRegisters::seeded(1), far);
        let served = tokio::spawn(peripheral.serve());

        let frame = Request::Write {
            addr: 0x1000,
            data: 0xcafe_f00d,
        }
        .encode(&Crc::default());
        near.write_all(&frame.bytes).await.unwrap();
        near.shutdown().await.unwrap();

        let registers = served.await.unwrap().unwrap();
        let cells: Vec<_> = registers.iter().collect();
        assert_eq!(cells, vec![(0x1000, 0xcafe_f00d)]);
    }
}
