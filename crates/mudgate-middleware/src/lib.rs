//! `mudgate-middleware` – The Nervous System
//!
//! Moves bytes and events between the MUD server, the session, and whoever is
//! watching, without caring what any of it means.
//!
//! # Modules
//!
//! - [`bus`] – [`EventBus`][bus::EventBus] / [`EventStream`][bus::EventStream]:
//!   unbounded, point-to-point event queue from the session to a presentation
//!   sink.
//! - [`transport`] – the [`MudTransport`][transport::MudTransport] trait every
//!   server connection implements.
//! - [`telnet`] – [`TelnetTransport`][telnet::TelnetTransport]: Tokio TCP
//!   connection that refuses every telnet option and paces outbound commands.

pub mod bus;
pub mod telnet;
pub mod transport;

pub use bus::{EventBus, EventStream};
pub use telnet::{TelnetDecoder, TelnetTransport};
pub use transport::{MudTransport, ReadOutcome};
