//! # Regbus Protocol Library
//!
//! This crate implements the regbus wire protocol: a small point-to-point
//! register-access protocol carried over an asynchronous byte transport
//! such as a serial line. A controller issues `Read`/`Write` commands
//! against a flat 32-bit register space on a peripheral, which answers with
//! a matching response carrying read data or a write acknowledgement.
//!
//! ## Wire format
//!
//! Every frame starts with the sync marker `0x47`, followed by a command
//! byte (`0x30` = Read, `0x50` = Write), big-endian payload fields and a
//! trailing CRC-8 computed over every preceding byte of the frame:
//!
//! | Frame          | Layout                          | Length |
//! |----------------|---------------------------------|--------|
//! | Read request   | sync · cmd · addr · crc         | 7      |
//! | Write request  | sync · cmd · addr · data · crc  | 11     |
//! | Read response  | sync · cmd · data · crc         | 7      |
//! | Write response | sync · cmd · crc                | 3      |
//!
//! There is no length prefix; the receiver derives the frame length from
//! the command byte alone. There is also no error-response frame: a
//! peripheral that cannot parse a request stays silent.
//!
//! ## Encoding
//!
//! ```
//! use regbus_protocol::{Crc, Request};
//!
//! let crc = Crc::default();
//! let frame = Request::Read { addr: 0 }.encode(&crc);
//! assert_eq!(&frame.bytes[..], &[0x47, 0x30, 0x00, 0x00, 0x00, 0x00, 0x7e]);
//!
//! // A correctly covered frame checksums to zero, trailing CRC included.
//! assert_eq!(crc.calculate(&frame.bytes), 0);
//! ```
//!
//! ## Parsing a fragmented stream
//!
//! A serial transport delivers bytes in arbitrary chunks. The
//! [`parser::StreamParser`] reassembles frames across deliveries and skips
//! over line noise:
//!
//! ```
//! use regbus_protocol::parser::ResponseParser;
//! use regbus_protocol::Response;
//!
//! let mut parser = ResponseParser::new();
//! assert!(parser.feed(&[0x47, 0x30, 0x12, 0x34]).is_empty());
//! let frames = parser.feed(&[0x56, 0x78, 0xba]);
//! assert_eq!(frames[0].response, Response::Read { data: 0x12345678 });
//! ```
//!
//! The parser checks structure only; CRC validation is left to the
//! transaction layer, which owns the error policy (see
//! [`error::TransactionError`]).
//!
//! ## Related crates
//!
//! - `regbus-client` — controller-side transactions with timeout handling
//! - `regbus-peripheral` — register-model responder loop

pub mod codec;
pub mod crc;
pub mod error;
pub mod parser;
pub mod protocol;

pub use crc::Crc;
pub use error::TransactionError;
pub use protocol::*;
