//! Incremental reconstruction of frames from a fragmented byte stream.
//!
//! A serial transport delivers bytes in arbitrary chunks: a frame may arrive
//! split across several deliveries, several frames may arrive back-to-back
//! in one delivery, and line noise may precede a frame. [`StreamParser`]
//! accumulates everything into a backlog and drains complete frames from it
//! in strict left-to-right order.
//!
//! One parser instance handles one direction: a peripheral parses
//! [`RequestFrame`]s, a controller parses [`ResponseFrame`]s.
//!
//! CRC correctness is deliberately not checked here. The parser only
//! establishes structure (sync marker, known command byte, full length);
//! checksum validation belongs to the transaction layer, which owns the
//! error policy.

use std::marker::PhantomData;

use bytes::{Buf, Bytes, BytesMut};

use crate::protocol::{
    Command, RequestFrame, ResponseFrame, SYNC_MARKER, request_len, response_len,
};

/// Direction-specific frame layout, implemented by [`RequestFrame`] and
/// [`ResponseFrame`].
pub trait WireFrame: Sized {
    /// Total frame length for `command` in this direction.
    fn frame_len(command: Command) -> usize;

    /// Decode a complete span of exactly `frame_len(command)` bytes.
    fn decode_frame(command: Command, bytes: Bytes) -> Self;
}

impl WireFrame for RequestFrame {
    fn frame_len(command: Command) -> usize {
        request_len(command)
    }

    fn decode_frame(command: Command, bytes: Bytes) -> Self {
        RequestFrame::decode(command, bytes)
    }
}

impl WireFrame for ResponseFrame {
    fn frame_len(command: Command) -> usize {
        response_len(command)
    }

    fn decode_frame(command: Command, bytes: Bytes) -> Self {
        ResponseFrame::decode(command, bytes)
    }
}

/// Outcome of a single parsing step over the backlog.
#[derive(Debug, Eq, PartialEq)]
pub enum Step<F> {
    /// No sync marker anywhere in the backlog. Nothing to do until more
    /// bytes arrive; the backlog is kept as-is.
    NoSync,
    /// A sync marker is present but the frame behind it is not complete
    /// yet. The backlog is kept unchanged.
    Incomplete,
    /// The byte after a sync marker is not a known command. The marker and
    /// that byte were discarded so parsing can resynchronize past noise.
    Malformed,
    /// A complete, structurally valid frame was extracted and consumed.
    Frame(F),
}

/// Stateful incremental decoder for one direction of the protocol.
///
/// The backlog is exclusively owned by the parser; [`StreamParser::feed`]
/// is the only way bytes enter it and frame extraction the only way they
/// leave.
#[derive(Debug)]
pub struct StreamParser<F> {
    backlog: BytesMut,
    direction: PhantomData<F>,
}

impl<F> Default for StreamParser<F> {
    fn default() -> Self {
        StreamParser {
            backlog: BytesMut::new(),
            direction: PhantomData,
        }
    }
}

/// Parses the request direction (used by a peripheral).
pub type RequestParser = StreamParser<RequestFrame>;
/// Parses the response direction (used by a controller).
pub type ResponseParser = StreamParser<ResponseFrame>;

impl<F: WireFrame> StreamParser<F> {
    pub fn new() -> StreamParser<F> {
        StreamParser {
            backlog: BytesMut::new(),
            direction: PhantomData,
        }
    }

    /// Bytes accumulated but not yet consumed by a frame.
    pub fn backlog(&self) -> &[u8] {
        &self.backlog
    }

    /// Append a transport chunk and drain every complete frame it enables,
    /// in arrival order.
    ///
    /// Malformed stretches are skipped internally; the loop stops once a
    /// step makes no progress (no sync marker, or an incomplete frame that
    /// needs more bytes).
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<F> {
        self.backlog.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match self.parse_one() {
                Step::Frame(frame) => frames.push(frame),
                Step::Malformed => continue,
                Step::NoSync | Step::Incomplete => break,
            }
        }
        frames
    }

    /// Attempt to extract a single frame from the front of the backlog.
    ///
    /// Noise before the sync marker is only discarded once the frame behind
    /// the marker resolves (either to a frame or to a malformed stretch);
    /// until then the backlog is left untouched.
    pub fn parse_one(&mut self) -> Step<F> {
        let Some(sync) = self.backlog.iter().position(|&byte| byte == SYNC_MARKER) else {
            return Step::NoSync;
        };

        let command_index = sync + 1;
        if self.backlog.len() <= command_index {
            return Step::Incomplete;
        }

        let Some(command) = Command::from_wire(self.backlog[command_index]) else {
            // Skip past the marker and the offending byte; the next scan
            // resynchronizes on whatever follows.
            self.backlog.advance(command_index + 1);
            return Step::Malformed;
        };

        let frame_len = F::frame_len(command);
        if self.backlog.len() < sync + frame_len {
            return Step::Incomplete;
        }

        self.backlog.advance(sync);
        let span = self.backlog.split_to(frame_len).freeze();
        Step::Frame(F::decode_frame(command, span))
    }
}
