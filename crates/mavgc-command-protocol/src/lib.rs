//! Text command protocol for the mavgc ground station.
//!
//! Humans and scripts drive the ground station with one command per line:
//!
//! ```text
//! <ordinal>=<arg1>=<arg2>...
//! ```
//!
//! The ordinal picks one of 24 commands (see [`CommandKind`]). Each line is
//! answered with `SUCCESS[=payload]`, `FAIL[=code]`, `BADCMD` or `NULL`.
//!
//! # Example
//!
//! ```
//! use mavgc_command_protocol::{Reply, Request};
//! use mavgc_wire::Target;
//!
//! let request = Request::parse("6=true=1=1").unwrap();
//! assert_eq!(
//!     request,
//!     Request::Arm { arm: true, target: Some(Target::new(1, 1)) }
//! );
//!
//! let reply = Reply::parse("FAIL=4").unwrap();
//! assert_eq!(reply, Reply::Fail(Some(4)));
//! ```

pub mod codec;
pub mod commands;
pub mod error;
pub mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
