//! Fixed-layout frame encoding and decoding.
//!
//! A frame is sync marker, command byte, big-endian payload fields and a
//! trailing CRC computed over every preceding byte. Frame length is fully
//! determined by direction and command; there is no length prefix.

use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::Crc;
use crate::protocol::{
    Command, Request, RequestFrame, Response, ResponseFrame, SYNC_MARKER, request_len,
    response_len,
};

impl Request {
    /// Encode this request, computing the trailing CRC with `crc`.
    ///
    /// The returned frame carries the exact bytes that go on the wire.
    pub fn encode(&self, crc: &Crc) -> RequestFrame {
        let command = self.command();
        let mut bytes = BytesMut::with_capacity(request_len(command));
        bytes.put_u8(SYNC_MARKER);
        bytes.put_u8(command.wire_value());
        match *self {
            Request::Read { addr } => {
                bytes.put_u32(addr);
            }
            Request::Write { addr, data } => {
                bytes.put_u32(addr);
                bytes.put_u32(data);
            }
        }
        let trailer = crc.calculate(&bytes);
        bytes.put_u8(trailer);

        RequestFrame {
            request: *self,
            crc: trailer,
            bytes: bytes.freeze(),
        }
    }
}

impl Response {
    /// Encode this response, computing the trailing CRC with `crc`.
    pub fn encode(&self, crc: &Crc) -> ResponseFrame {
        let command = self.command();
        let mut bytes = BytesMut::with_capacity(response_len(command));
        bytes.put_u8(SYNC_MARKER);
        bytes.put_u8(command.wire_value());
        if let Response::Read { data } = *self {
            bytes.put_u32(data);
        }
        let trailer = crc.calculate(&bytes);
        bytes.put_u8(trailer);

        ResponseFrame {
            response: *self,
            crc: trailer,
            bytes: bytes.freeze(),
        }
    }
}

impl RequestFrame {
    /// Decode a request frame from a span of exactly
    /// [`request_len`]`(command)` bytes starting at the sync marker.
    ///
    /// The CRC byte is taken as-is; whether it is consistent with the rest
    /// of the span is for the caller to check.
    pub fn decode(command: Command, bytes: Bytes) -> RequestFrame {
        debug_assert_eq!(bytes.len(), request_len(command));
        let addr = u32::from_be_bytes(bytes[2..6].try_into().unwrap());
        match command {
            Command::Read => RequestFrame {
                request: Request::Read { addr },
                crc: bytes[6],
                bytes,
            },
            Command::Write => {
                let data = u32::from_be_bytes(bytes[6..10].try_into().unwrap());
                RequestFrame {
                    request: Request::Write { addr, data },
                    crc: bytes[10],
                    bytes,
                }
            }
        }
    }
}

impl ResponseFrame {
    /// Decode a response frame from a span of exactly
    /// [`response_len`]`(command)` bytes starting at the sync marker.
    pub fn decode(command: Command, bytes: Bytes) -> ResponseFrame {
        debug_assert_eq!(bytes.len(), response_len(command));
        match command {
            Command::Read => {
                let data = u32::from_be_bytes(bytes[2..6].try_into().unwrap());
                ResponseFrame {
                    response: Response::Read { data },
                    crc: bytes[6],
                    bytes,
                }
            }
            Command::Write => ResponseFrame {
                response: Response::Write,
                crc: bytes[2],
                bytes,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_read_request() {
        let frame = Request::Read { addr: 0 }.encode(&Crc::default());
        assert_eq!(&frame.bytes[..], &[0x47, 0x30, 0x00, 0x00, 0x00, 0x00, 0x7e]);
        assert_eq!(frame.crc, 0x7e);
    }

    #[test]
    fn encode_write_request() {
        let frame = Request::Write {
            addr: 0x0000_0001,
            data: 0x1234_5678,
        }
        .encode(&Crc::default());
        assert_eq!(
            &frame.bytes[..],
            &[0x47, 0x50, 0x00, 0x00, 0x00, 0x01, 0x12, 0x34, 0x56, 0x78, 0xd6]
        );
    }

    #[test]
    fn encode_read_response() {
        let frame = Response::Read { data: 0x1234_5678 }.encode(&Crc::default());
        assert_eq!(&frame.bytes[..], &[0x47, 0x30, 0x12, 0x34, 0x56, 0x78, 0xba]);
    }

    #[test]
    fn encode_write_response() {
        let frame = Response::Write.encode(&Crc::default());
        assert_eq!(&frame.bytes[..], &[0x47, 0x50, 0x77]);
    }

    #[test]
    fn encoded_frames_checksum_to_zero() {
        let crc = Crc::default();
        for request in [
            Request::Read { addr: 0 },
            Request::Read { addr: u32::MAX },
            Request::Write {
                addr: 0xdead_beef,
                data: 0,
            },
            Request::Write {
                addr: 0,
                data: u32::MAX,
            },
        ] {
            assert_eq!(crc.calculate(&request.encode(&crc).bytes), 0);
        }
        for response in [Response::Read { data: u32::MAX }, Response::Write] {
            assert_eq!(crc.calculate(&response.encode(&crc).bytes), 0);
        }
    }

    #[test]
    fn request_round_trip() {
        let crc = Crc::default();
        for request in [
            Request::Read { addr: 0 },
            Request::Read { addr: u32::MAX },
            Request::Read { addr: 0x0000_1234 },
            Request::Write { addr: 0, data: 0 },
            Request::Write {
                addr: u32::MAX,
                data: u32::MAX,
            },
            Request::Write {
                addr: 0x4747_4747,
                data: 0x0bad_cafe,
            },
        ] {
            let encoded = request.encode(&crc);
            let decoded = RequestFrame::decode(request.command(), encoded.bytes.clone());
            assert_eq!(decoded, encoded);
            assert_eq!(decoded.request, request);
        }
    }

    #[test]
    fn response_round_trip() {
        let crc = Crc::default();
        for response in [
            Response::Read { data: 0 },
            Response::Read { data: u32::MAX },
            Response::Read { data: 0x1234_5678 },
            Response::Write,
        ] {
            let encoded = response.encode(&crc);
            let decoded = ResponseFrame::decode(response.command(), encoded.bytes.clone());
            assert_eq!(decoded, encoded);
            assert_eq!(decoded.response, response);
        }
    }
}
