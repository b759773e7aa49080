//! Frame encoding/decoding.
//!
//! MAVLink v1 frames look like this on the wire:
//!
//! ```text
//! +------+-----+-----+-----+------+-------+-----------------+--------+--------+
//! | 0xFE | len | seq | sys | comp | msgid | payload[0..len] | crc_lo | crc_hi |
//! +------+-----+-----+-----+------+-------+-----------------+--------+--------+
//! ```
//!
//! The checksum covers `len..payload` plus the per-message extra byte. The
//! decoder is a byte-at-a-time automaton. Frames that fail the checksum or
//! carry an unknown message id are discarded without surfacing an error; the
//! parser then rescans the discarded bytes for the next start marker, so a
//! truncated frame followed by a good one still yields the good one.

use bytes::{Buf, BytesMut};
use mavgc_metrics::{metric_defs, metrics};
use tracing::trace;

use crate::constants::{crc_extra, CHECKSUM_LEN, HEADER_LEN, MAX_FRAME_LEN, STX};
use crate::checksum::frame_checksum;
use crate::error::WireResult;
use crate::messages::Message;

/// A decoded frame: header fields plus the typed message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sender's sequence counter.
    pub seq: u8,
    /// Sender's system id.
    pub system_id: u8,
    /// Sender's component id.
    pub component_id: u8,
    /// The decoded message.
    pub message: Message,
}

/// Counters describing what the decoder threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    /// Frames decoded into a known message.
    pub frames_decoded: u64,
    /// Frames dropped on checksum mismatch.
    pub crc_errors: u64,
    /// Well-formed frames of a message id outside the dialect.
    pub unknown_ids: u64,
    /// Frames whose checksum passed but whose payload did not decode.
    pub malformed: u64,
}

impl CodecStats {
    /// Total number of dropped frames.
    pub fn dropped(&self) -> u64 {
        self.crc_errors + self.unknown_ids + self.malformed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParseState {
    #[default]
    WaitStart,
    Len,
    Seq,
    Sys,
    Comp,
    MsgId,
    Payload,
    CrcLo,
    CrcHi,
}

/// Streaming decoder for inbound frames.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Received bytes not yet run through the automaton.
    input: BytesMut,
    /// Bytes of the frame currently being assembled, start marker included.
    frame: Vec<u8>,
    state: ParseState,
    payload_len: usize,
    stats: CodecStats,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec {
            input: BytesMut::with_capacity(MAX_FRAME_LEN * 2),
            frame: Vec::with_capacity(MAX_FRAME_LEN),
            ..Default::default()
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
    }

    /// Try to decode the next complete frame.
    ///
    /// Returns `None` once every buffered byte has been consumed without
    /// completing a valid frame; a partial frame stays buffered.
    pub fn decode(&mut self) -> Option<Frame> {
        while self.input.has_remaining() {
            let byte = self.input.get_u8();
            if let Some(frame) = self.step(byte) {
                return Some(frame);
            }
        }
        None
    }

    /// Decode every complete frame currently buffered.
    pub fn decode_all(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.decode()).collect()
    }

    fn step(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ParseState::WaitStart => {
                if byte == STX {
                    self.frame.clear();
                    self.frame.push(byte);
                    self.state = ParseState::Len;
                }
            }
            ParseState::Len => {
                self.frame.push(byte);
                self.payload_len = byte as usize;
                self.state = ParseState::Seq;
            }
            ParseState::Seq => self.advance(byte, ParseState::Sys),
            ParseState::Sys => self.advance(byte, ParseState::Comp),
            ParseState::Comp => self.advance(byte, ParseState::MsgId),
            ParseState::MsgId => {
                let next = if self.payload_len == 0 {
                    ParseState::CrcLo
                } else {
                    ParseState::Payload
                };
                self.advance(byte, next);
            }
            ParseState::Payload => {
                self.frame.push(byte);
                if self.frame.len() == 1 + HEADER_LEN + self.payload_len {
                    self.state = ParseState::CrcLo;
                }
            }
            ParseState::CrcLo => self.advance(byte, ParseState::CrcHi),
            ParseState::CrcHi => {
                self.frame.push(byte);
                self.state = ParseState::WaitStart;
                return self.finish_frame();
            }
        }
        None
    }

    fn advance(&mut self, byte: u8, next: ParseState) {
        self.frame.push(byte);
        self.state = next;
    }

    /// Validate the assembled frame and decode its payload.
    fn finish_frame(&mut self) -> Option<Frame> {
        let header_end = 1 + HEADER_LEN;
        let payload_end = header_end + self.payload_len;
        let msg_id = self.frame[5];

        let Some(extra) = crc_extra(msg_id) else {
            self.stats.unknown_ids += 1;
            metrics::counter!(metric_defs::CODEC_FRAMES_DROPPED.name, "reason" => "unknown_id")
                .increment(1);
            trace!("FrameCodec: dropping frame with unknown msgid {}", msg_id);
            return None;
        };

        let expected = frame_checksum(
            &self.frame[1..header_end],
            &self.frame[header_end..payload_end],
            extra,
        );
        let actual = u16::from_le_bytes([self.frame[payload_end], self.frame[payload_end + 1]]);
        if expected != actual {
            self.stats.crc_errors += 1;
            metrics::counter!(metric_defs::CODEC_FRAMES_DROPPED.name, "reason" => "crc")
                .increment(1);
            trace!(
                "FrameCodec: checksum mismatch on msgid {} (expected {:#06x}, got {:#06x})",
                msg_id,
                expected,
                actual
            );
            self.resync();
            return None;
        }

        match Message::decode(msg_id, &self.frame[header_end..payload_end]) {
            Ok(message) => {
                self.stats.frames_decoded += 1;
                metrics::counter!(metric_defs::CODEC_FRAMES_DECODED.name).increment(1);
                Some(Frame {
                    seq: self.frame[2],
                    system_id: self.frame[3],
                    component_id: self.frame[4],
                    message,
                })
            }
            Err(err) => {
                self.stats.malformed += 1;
                metrics::counter!(metric_defs::CODEC_FRAMES_DROPPED.name, "reason" => "malformed")
                    .increment(1);
                trace!("FrameCodec: payload decode failed on msgid {}: {}", msg_id, err);
                None
            }
        }
    }

    /// Put the bytes after the rejected frame's start marker back in front of
    /// the input so that a start marker hidden inside them is found again.
    fn resync(&mut self) {
        let Some(offset) = self.frame[1..].iter().position(|&b| b == STX) else {
            return;
        };
        let mut replay = BytesMut::with_capacity(self.frame.len() + self.input.len());
        replay.extend_from_slice(&self.frame[1 + offset..]);
        replay.extend_from_slice(&self.input);
        self.input = replay;
        self.frame.clear();
    }

    /// Decoder counters.
    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// Get the number of buffered, unparsed bytes.
    pub fn buffered_len(&self) -> usize {
        self.input.len()
    }

    /// Drop all buffered bytes and any partial frame.
    pub fn clear(&mut self) {
        self.input.clear();
        self.frame.clear();
        self.state = ParseState::WaitStart;
    }
}

/// Outbound side: frames messages with this station's identity and an
/// incrementing, wrapping sequence counter.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    system_id: u8,
    component_id: u8,
    seq: u8,
}

impl FrameEncoder {
    /// Create an encoder that stamps frames with the given sender identity.
    pub fn new(system_id: u8, component_id: u8) -> Self {
        FrameEncoder {
            system_id,
            component_id,
            seq: 0,
        }
    }

    /// Encode a message into a complete frame and advance the sequence.
    pub fn encode(&mut self, message: &Message) -> WireResult<Vec<u8>> {
        let bytes = encode_frame(self.seq, self.system_id, self.component_id, message)?;
        self.seq = self.seq.wrapping_add(1);
        Ok(bytes)
    }

    /// Sequence number the next frame will carry.
    pub fn next_seq(&self) -> u8 {
        self.seq
    }
}

/// Encode a message into a frame with explicit header fields.
pub fn encode_frame(seq: u8, system_id: u8, component_id: u8, message: &Message) -> WireResult<Vec<u8>> {
    let payload = message.encode_payload()?;
    let msg_id = message.id();
    let extra = crc_extra(msg_id).ok_or(crate::WireError::UnknownMessage(msg_id))?;

    let header = [payload.len() as u8, seq, system_id, component_id, msg_id];
    let checksum = frame_checksum(&header, &payload, extra);

    let mut buf = Vec::with_capacity(1 + HEADER_LEN + payload.len() + CHECKSUM_LEN);
    buf.push(STX);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}
