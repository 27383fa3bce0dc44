//! Built-in handlers for NPC editing messages.
//!
//! Saves and deletes change the shared registry and are broadcast to every
//! open session. The broadcast happens while the registry's write lock is
//! still held, so all clients observe changes in the order the registry
//! applied them.

use ember_protocol::{
    ErrorReply, Frame, MessageTag, id_frame, npc_frame, npc_list_frame, read_npc,
};
use ember_registry::save_entity;
use ember_session::Session;

use crate::router::reply_error;
use crate::{EmberError, ServerContext};

/// `DISCONNECT`: the client is leaving.
pub(crate) fn disconnect(
    _ctx: &ServerContext,
    session: &Session,
    frame: &Frame,
) -> Result<(), EmberError> {
    let reason = frame.body_cursor().read_string()?;
    session.close(format!("client disconnect: {reason}"));
    Ok(())
}

/// `NPC_SAVE`: persist, upsert, broadcast `NPC_DATA`.
///
/// Persisting, inserting and broadcasting all happen under the registry's
/// write lock, so concurrent saves of one id reach storage in the same
/// order as the registry. If storage fails the registry is left untouched
/// and only the sender hears about it.
pub(crate) fn save(
    ctx: &ServerContext,
    session: &Session,
    frame: &Frame,
) -> Result<(), EmberError> {
    let (id, npc) = read_npc(ctx.npc_codec(), &mut frame.body_cursor())?;
    let update = npc_frame(MessageTag::NPC_DATA, ctx.npc_codec(), id, &npc)?;
    let name = npc.name.clone();

    let mut npcs = ctx.npcs().write();
    if let Err(e) = save_entity(ctx.npc_store(), ctx.npc_codec(), id, &npc) {
        drop(npcs);
        tracing::warn!(session = %session.id(), %id, error = %e, "failed to persist npc");
        reply_error(session, ErrorReply::INTERNAL, format!("could not save {id}: {e}"));
        return Ok(());
    }
    npcs.insert(id, npc);
    let delivered = ctx.broadcast(&update);
    drop(npcs);

    tracing::info!(session = %session.id(), %id, %name, delivered, "npc saved");
    Ok(())
}

/// `NPC_DELETE`: remove, broadcast `NPC_REMOVED`, or answer 404.
pub(crate) fn delete(
    ctx: &ServerContext,
    session: &Session,
    frame: &Frame,
) -> Result<(), EmberError> {
    let id = frame.body_cursor().read_object_id()?;
    let removed = id_frame(MessageTag::NPC_REMOVED, id)?;

    let mut npcs = ctx.npcs().write();
    match npcs.remove(id) {
        Ok(npc) => {
            let delivered = ctx.broadcast(&removed);
            drop(npcs);
            tracing::info!(session = %session.id(), %id, name = %npc.name, delivered, "npc removed");
        }
        Err(e) => {
            drop(npcs);
            reply_error(session, ErrorReply::NOT_FOUND, e.to_string());
        }
    }
    Ok(())
}

/// `NPC_LIST_REQUEST`: reply with every `(id, name)` in registry order.
pub(crate) fn list(
    ctx: &ServerContext,
    session: &Session,
    _frame: &Frame,
) -> Result<(), EmberError> {
    let reply = npc_list_frame(ctx.npcs().read().entries())?;
    session.send(reply);
    Ok(())
}

/// `NPC_REQUEST`: reply with `NPC_DATA`, or 404.
pub(crate) fn request(
    ctx: &ServerContext,
    session: &Session,
    frame: &Frame,
) -> Result<(), EmberError> {
    let id = frame.body_cursor().read_object_id()?;
    let reply = match ctx.npcs().read().get(id) {
        Ok(npc) => npc_frame(MessageTag::NPC_DATA, ctx.npc_codec(), id, npc)?,
        Err(e) => ErrorReply::new(ErrorReply::NOT_FOUND, e.to_string()).to_frame()?,
    };
    session.send(reply);
    Ok(())
}
