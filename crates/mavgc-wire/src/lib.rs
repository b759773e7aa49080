//! MAVLink v1 wire format for the mavgc ground station.
//!
//! This crate turns a byte stream from a vehicle link into typed [`Frame`]s
//! and typed [`Message`]s back into bytes. It knows only the subset of the
//! common dialect the ground station speaks: heartbeats, missions,
//! parameters, commands, safety area, GPS origin, data streams and log
//! listing.
//!
//! # Protocol Overview
//!
//! - Every frame starts with `0xFE`, carries a 5 byte header, a payload of
//!   up to 255 bytes and an X.25 checksum seeded with a per-message extra byte.
//! - Corrupted frames and unknown message ids are dropped silently; the
//!   decoder counts them in [`CodecStats`].
//!
//! # Example
//!
//! ```rust
//! use mavgc_wire::{CommandAck, FrameCodec, FrameEncoder, Message};
//!
//! let mut encoder = FrameEncoder::new(255, 190);
//! let ack = Message::CommandAck(CommandAck { command: 400, result: 0 });
//! let bytes = encoder.encode(&ack).unwrap();
//!
//! let mut codec = FrameCodec::new();
//! codec.push(&bytes);
//! assert_eq!(codec.decode().unwrap().message, ack);
//! ```

mod constants;
mod checksum;
mod error;
mod frame;
mod messages;
mod text;
mod types;

pub use constants::*;
pub use checksum::frame_checksum;
pub use error::*;
pub use frame::*;
pub use messages::*;
pub use text::*;
pub use types::*;
