//! Inbound dispatch: frame header → registered handler.
//!
//! Every inbound frame goes through [`Router::dispatch`]:
//!
//! ```text
//! bytes ──→ Frame::decode ──→ session open? ──→ handler for tag
//!               │                  │                  │
//!               ▼                  ▼                  ▼
//!        version mismatch     HANDSHAKE opens     unknown tag:
//!        → ERROR(426)         the session         warn + drop
//! ```
//!
//! Nothing a client sends can tear down the server or another session:
//! malformed frames are dropped and logged, and the session lives on.

use std::collections::HashMap;
use std::fmt;

use ember_protocol::{ErrorReply, Frame, HandshakeAck, MessageTag, ProtocolError};
use ember_session::Session;

use crate::{EmberError, ServerContext, npc};

/// Handles one kind of inbound frame.
///
/// Implemented for any `Fn(&ServerContext, &Session, &Frame)` closure or
/// function, so plain functions can be registered directly.
///
/// Handlers run on the session's read path. They may lock registries and
/// queue frames, but must not block.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(
        &self,
        ctx: &ServerContext,
        session: &Session,
        frame: &Frame,
    ) -> Result<(), EmberError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&ServerContext, &Session, &Frame) -> Result<(), EmberError>
        + Send
        + Sync
        + 'static,
{
    fn handle(
        &self,
        ctx: &ServerContext,
        session: &Session,
        frame: &Frame,
    ) -> Result<(), EmberError> {
        self(ctx, session, frame)
    }
}

/// Maps message tags to handlers.
pub struct Router {
    handlers: HashMap<MessageTag, Box<dyn MessageHandler>>,
}

impl Router {
    /// A router with no handlers. Only the handshake is understood.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A router with the built-in `DISCONNECT` and NPC handlers.
    pub fn with_npc_handlers() -> Self {
        Self::new()
            .route(MessageTag::DISCONNECT, npc::disconnect)
            .route(MessageTag::NPC_SAVE, npc::save)
            .route(MessageTag::NPC_DELETE, npc::delete)
            .route(MessageTag::NPC_LIST_REQUEST, npc::list)
            .route(MessageTag::NPC_REQUEST, npc::request)
    }

    /// Registers `handler` for `tag`, replacing any previous one.
    pub fn route(mut self, tag: MessageTag, handler: impl MessageHandler) -> Self {
        self.handlers.insert(tag, Box::new(handler));
        self
    }

    /// Returns `true` if a handler is registered for `tag`.
    pub fn handles(&self, tag: MessageTag) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Processes one complete inbound frame for `session`.
    pub fn dispatch(&self, ctx: &ServerContext, session: &Session, data: &[u8]) {
        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(e @ ProtocolError::FormatVersionMismatch { .. }) => {
                reject_version(session, &e);
                return;
            }
            Err(e) => {
                tracing::debug!(session = %session.id(), error = %e, "dropping malformed frame");
                return;
            }
        };

        if !session.is_open() {
            if frame.tag == MessageTag::HANDSHAKE {
                accept_handshake(ctx, session);
            } else {
                tracing::debug!(
                    session = %session.id(), tag = %frame.tag,
                    "dropping frame received before handshake"
                );
            }
            return;
        }

        let Some(handler) = self.handlers.get(&frame.tag) else {
            if frame.tag == MessageTag::HANDSHAKE {
                tracing::debug!(session = %session.id(), "ignoring repeated handshake");
            } else {
                let e = ProtocolError::UnknownMessageType(frame.tag.0);
                tracing::warn!(session = %session.id(), error = %e, "dropping frame");
            }
            return;
        };

        if let Err(e) = handler.handle(ctx, session, &frame) {
            if e.is_malformed_input() {
                tracing::debug!(
                    session = %session.id(), tag = %frame.tag, error = %e,
                    "dropping malformed message"
                );
            } else {
                tracing::warn!(
                    session = %session.id(), tag = %frame.tag, error = %e,
                    "handler failed"
                );
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::with_npc_handlers()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.handlers.keys().map(|tag| tag.0).collect();
        tags.sort_unstable();
        f.debug_struct("Router").field("tags", &tags).finish()
    }
}

fn accept_handshake(ctx: &ServerContext, session: &Session) {
    if !session.open() {
        return;
    }
    let ack = HandshakeAck {
        session_id: session.id().into_inner(),
        limits: ctx.limits(),
    };
    match ack.to_frame() {
        Ok(frame) => {
            session.send(frame);
        }
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "failed to encode handshake ack");
            session.close("handshake failed");
        }
    }
}

/// Answers a frame with an unsupported format version.
///
/// An open session gets an `ERROR` frame and stays open. A session still
/// handshaking cannot talk to us at all: the `ERROR` frame is its last,
/// and it is closed without ever being opened.
fn reject_version(session: &Session, e: &ProtocolError) {
    tracing::warn!(session = %session.id(), error = %e, "rejecting frame");
    if session.is_open() {
        reply_error(session, ErrorReply::VERSION_MISMATCH, e.to_string());
        return;
    }
    match ErrorReply::new(ErrorReply::VERSION_MISMATCH, e.to_string()).to_frame() {
        Ok(frame) => {
            session.close_with_frame(frame, "unsupported format version");
        }
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "failed to encode error reply");
            session.close("unsupported format version");
        }
    }
}

/// Queues an `ERROR` frame on `session`.
pub(crate) fn reply_error(session: &Session, code: i32, message: impl Into<String>) {
    match ErrorReply::new(code, message).to_frame() {
        Ok(frame) => {
            session.send(frame);
        }
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "failed to encode error reply")
        }
    }
}
