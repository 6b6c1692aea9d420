//! `mudgate-kernel` – Gating & Safety
//!
//! The brainstem of MudGate. It does not think; it decides when thinking is
//! allowed and what reaches the server.
//!
//! # Modules
//!
//! - [`throttle`] – [`InvocationThrottle`][throttle::InvocationThrottle]:
//!   rate-limits oracle calls, buffering routine change sets while letting
//!   life-threatening ones through immediately.
//! - [`loop_detector`] – [`LoopDetector`][loop_detector::LoopDetector]:
//!   spots repeating command cycles and proposes a breaker command.
//! - [`command_validator`] – [`CommandValidator`][command_validator::CommandValidator]:
//!   the single interception point every command passes through before it
//!   is written to the transport.  Combines loop breaking and exit
//!   consistency checks in one call.
//! - [`commands`] – helpers that recognise movement and `peer` commands.

pub mod command_validator;
pub mod commands;
pub mod loop_detector;
pub mod throttle;

pub use command_validator::{CommandValidator, RewriteReason, Validated};
pub use loop_detector::LoopDetector;
pub use throttle::{Admission, InvocationThrottle};
