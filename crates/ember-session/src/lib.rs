//! Connection sessions for Ember.
//!
//! This crate owns the lifecycle of one client connection and the set of
//! all of them:
//!
//! 1. **Session** — state machine, bounded outbound queue, and the pump
//!    that reads and writes one transport connection ([`Session`])
//! 2. **Live set** — who is connected right now, and broadcast fan-out to
//!    all of them ([`LiveSessions`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← decodes frames, mutates registries, broadcasts
//!     ↕
//! Session (this crate)  ← ordering, backpressure, close semantics
//!     ↕
//! Transport (below) ← moves whole binary messages
//! ```
//!
//! # Threading
//!
//! Sessions are shared as `Arc<Session>`. Each session's pump runs on its
//! own task; [`Session::send`] and [`Session::close`] may be called from
//! any task and never wait on the network.

mod error;
mod live;
mod queue;
mod session;

pub use error::SessionError;
pub use live::LiveSessions;
pub use queue::OverflowPolicy;
pub use session::{Session, SessionConfig, SessionState};
