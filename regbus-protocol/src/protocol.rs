use std::fmt::Display;

use bytes::Bytes;

/// Fixed byte every frame starts with.
pub const SYNC_MARKER: u8 = 0x47;

/// The two operations the protocol defines.
///
/// The wire value doubles as the command byte of every frame, in both
/// directions. There is no error or NACK command; a peripheral that cannot
/// parse a request stays silent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Read,
    Write,
}

impl Command {
    /// The byte this command is encoded as.
    pub fn wire_value(self) -> u8 {
        match self {
            Command::Read => 0x30,
            Command::Write => 0x50,
        }
    }

    /// Decode a command byte. Returns `None` for anything that is not a
    /// known command, which the stream parser treats as noise.
    pub fn from_wire(byte: u8) -> Option<Command> {
        match byte {
            0x30 => Some(Command::Read),
            0x50 => Some(Command::Write),
            _ => None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Read => write!(f, "Read"),
            Command::Write => write!(f, "Write"),
        }
    }
}

/// A controller-to-peripheral command addressing the 32-bit register space.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Request {
    /// Read the register at `addr`.
    Read { addr: u32 },
    /// Store `data` into the register at `addr`.
    Write { addr: u32, data: u32 },
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::Read { .. } => Command::Read,
            Request::Write { .. } => Command::Write,
        }
    }
}

/// A peripheral-to-controller reply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Response {
    /// Carries the value read from the requested register.
    Read { data: u32 },
    /// Acknowledges a write; carries no payload.
    Write,
}

impl Response {
    pub fn command(&self) -> Command {
        match self {
            Response::Read { .. } => Command::Read,
            Response::Write => Command::Write,
        }
    }
}

/// Number of bytes a request frame occupies for the given command,
/// sync marker and trailing CRC included.
pub fn request_len(command: Command) -> usize {
    match command {
        // sync + command + addr + crc
        Command::Read => 1 + 1 + 4 + 1,
        // sync + command + addr + data + crc
        Command::Write => 1 + 1 + 4 + 4 + 1,
    }
}

/// Number of bytes a response frame occupies for the given command.
pub fn response_len(command: Command) -> usize {
    match command {
        // sync + command + data + crc
        Command::Read => 1 + 1 + 4 + 1,
        // sync + command + crc
        Command::Write => 1 + 1 + 1,
    }
}

/// A request together with the exact byte span it was decoded from (or
/// encoded to) and the CRC byte that span carried.
///
/// The span is kept for diagnostics: [`Display`] renders a trace line with
/// hexadecimal fields and the raw bytes, which is what the client hands to
/// its diagnostic callback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestFrame {
    pub request: Request,
    pub crc: u8,
    pub bytes: Bytes,
}

/// A response together with its byte span and trailing CRC byte.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseFrame {
    pub response: Response,
    pub crc: u8,
    pub bytes: Bytes,
}

fn fmt_span(f: &mut std::fmt::Formatter<'_>, bytes: &Bytes) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{:02x}", byte)?;
    }
    write!(f, "]")
}

impl Display for RequestFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.request {
            Request::Read { addr } => write!(f, "Read addr={:08x} ", addr)?,
            Request::Write { addr, data } => {
                write!(f, "Write addr={:08x} data={:08x} ", addr, data)?
            }
        }
        fmt_span(f, &self.bytes)
    }
}

impl Display for ResponseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.response {
            Response::Read { data } => write!(f, "Read data={:08x} ", data)?,
            Response::Write => write!(f, "Write ")?,
        }
        fmt_span(f, &self.bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_wire_values() {
        assert_eq!(Command::Read.wire_value(), 0x30);
        assert_eq!(Command::Write.wire_value(), 0x50);
        assert_eq!(Command::from_wire(0x30), Some(Command::Read));
        assert_eq!(Command::from_wire(0x50), Some(Command::Write));
        assert_eq!(Command::from_wire(0x47), None);
        assert_eq!(Command::from_wire(0x00), None);
    }

    #[test]
    fn frame_lengths() {
        assert_eq!(request_len(Command::Read), 7);
        assert_eq!(request_len(Command::Write), 11);
        assert_eq!(response_len(Command::Read), 7);
        assert_eq!(response_len(Command::Write), 3);
    }

    #[test]
    fn request_trace_line() {
        let frame = RequestFrame {
            request: Request::Read { addr: 0x1234 },
            crc: 0x40,
            bytes: Bytes::from_static(&[0x47, 0x30, 0x00, 0x00, 0x12, 0x34, 0x40]),
        };
        assert_eq!(
            frame.to_string(),
            "Read addr=00001234 [47 30 00 00 12 34 40]"
        );
    }

    #[test]
    fn response_trace_line() {
        let frame = ResponseFrame {
            response: Response::Write,
            crc: 0x77,
            bytes: Bytes::from_static(&[0x47, 0x50, 0x77]),
        };
        assert_eq!(frame.to_string(), "Write [47 50 77]");
    }
}
