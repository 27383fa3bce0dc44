//! A runnable NPC editing server.
//!
//! Serves the NPC registry over WebSocket at `ws://<host>:<port>/game`,
//! seeded with a few NPCs from an in-memory store. Every client that
//! completes the handshake sees every other client's edits.
//!
//! Environment:
//!
//! | Variable              | Default     |
//! |-----------------------|-------------|
//! | `EMBER_HOST`          | `127.0.0.1` |
//! | `EMBER_PORT`          | `7070`      |
//! | `EMBER_MAX_NPC_DROPS` | `10`        |
//! | `RUST_LOG`            | `info`      |

use std::sync::Arc;

use ember::prelude::*;
use ember::registry::{restore_into, save_entity};
use tracing_subscriber::EnvFilter;

/// Builds the server config from scalar overrides.
///
/// `var` looks up one variable; unset or unparsable values keep the
/// default.
fn config_from(var: impl Fn(&str) -> Option<String>) -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(host) = var("EMBER_HOST") {
        config = config.host(host);
    }
    if let Some(port) = var("EMBER_PORT").and_then(|v| v.parse().ok()) {
        config = config.port(port);
    }
    if let Some(drops) = var("EMBER_MAX_NPC_DROPS").and_then(|v| v.parse().ok()) {
        config.limits.max_npc_drops = drops;
    }
    config
}

/// A store pre-filled with a handful of NPCs, and their ids.
fn seeded_store(limits: GameLimits) -> Result<(MemoryBlobStore, Vec<ObjectId>), RegistryError> {
    let store = MemoryBlobStore::new();
    let codec = NpcCodec::new(limits);
    let seeds = [
        (ObjectId(1), "Goblin", NpcBehavior::ATTACK_ON_SIGHT),
        (ObjectId(2), "Village Guard", NpcBehavior::GUARD),
        (ObjectId(3), "Merchant", NpcBehavior::FRIENDLY),
    ];
    for (id, name, behavior) in seeds {
        let npc = Npc {
            name: name.to_string(),
            behavior,
            ..Npc::new(&limits)
        };
        save_entity(&store, &codec, id, &npc)?;
    }
    let ids = seeds.iter().map(|(id, _, _)| *id).collect();
    Ok((store, ids))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from(|name| std::env::var(name).ok());
    let (store, ids) = seeded_store(config.limits)?;
    let store: Arc<dyn BlobStore> = Arc::new(store);

    let mut npcs = EntityRegistry::new();
    let report = restore_into(&mut npcs, store.as_ref(), &NpcCodec::new(config.limits), ids);
    tracing::info!(loaded = report.loaded.len(), "seed NPCs loaded");

    let server = Server::builder()
        .config(config)
        .npc_store(store)
        .npcs(SharedRegistry::from_registry(npcs))
        .start()
        .await?;
    tracing::info!(addr = %server.local_addr(), "npc-server ready, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}
