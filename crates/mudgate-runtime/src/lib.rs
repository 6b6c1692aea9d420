//! `mudgate-runtime` – The Decision Loop
//!
//! Where the gating pipeline meets the outside world: the session loop that
//! reads the server, asks the oracle, and writes commands back.
//!
//! # Modules
//!
//! - [`session`] – [`Session`][session::Session]: one connection's pipeline,
//!   wiring [`StateTracker`][mudgate_perception::StateTracker],
//!   [`InvocationThrottle`], [`ChangeClassifier`][mudgate_perception::ChangeClassifier],
//!   the oracle, and [`CommandValidator`] together, plus a cloneable
//!   [`SessionHandle`][session::SessionHandle] for pause/resume, manual
//!   commands, and shutdown.
//! - [`oracle`] – the [`Oracle`][oracle::Oracle] trait with Anthropic and
//!   OpenAI-compatible (Ollama) HTTP drivers, bounded retry, and token usage
//!   accounting.  [`STABILITY_GUIDELINES`][oracle::STABILITY_GUIDELINES] are
//!   appended to every system prompt.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber (stderr, compact or JSON) with an optional
//!   OTLP span exporter.
//!
//! # Gating
//!
//! Every command, oracle-proposed or manual, passes through
//! [`CommandValidator::validate`] before it reaches the transport.  The
//! kernel types are re-exported so callers can configure them without a
//! direct dependency on `mudgate-kernel`.

pub mod oracle;
pub mod session;
pub mod telemetry;

pub use oracle::{
    AnthropicOracle, OpenAiCompatOracle, Oracle, OracleError, Proposal, RetryPolicy,
    STABILITY_GUIDELINES, Usage, UsageMeter,
};
pub use session::{Control, CycleOutcome, Session, SessionConfig, SessionHandle};
pub use telemetry::{TracerProviderGuard, init_tracing};

pub use mudgate_kernel::{CommandValidator, InvocationThrottle};
