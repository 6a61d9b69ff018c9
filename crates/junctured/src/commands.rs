//! Built-in commands and background broadcasts of the daemon

use std::sync::Arc;
use std::time::Duration;

use juncture_core::{BoxError, CommandBridge, Hub, StateStore};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Register the commands every daemon exposes
pub fn register_builtin(bridge: &CommandBridge, store: Arc<StateStore>) -> juncture_core::Result<()> {
    bridge.register_handler("ping", |_args: Value| async { Ok::<Value, BoxError>(json!("pong")) })?;

    bridge.register_handler("get-message", |_args: Value| async {
        Ok::<Value, BoxError>(json!("HELLO"))
    })?;

    let reader = store.clone();
    bridge.register_handler("get-state", move |_args: Value| {
        let store = reader.clone();
        async move { Ok::<Value, BoxError>(Value::Object(store.snapshot())) }
    })?;

    let hub = bridge.hub().clone();
    bridge.register_handler("set-state", move |args: Value| {
        let store = store.clone();
        let hub = hub.clone();
        async move { set_state(&store, &hub, args).await }
    })?;

    Ok(())
}

async fn set_state(store: &StateStore, hub: &Hub, args: Value) -> Result<Value, BoxError> {
    let patch = match args {
        Value::Object(patch) => patch,
        other => {
            return Err(format!(
                "set-state expects an object, got {}",
                juncture_core::reconcile::kind_of(&other)
            )
            .into())
        }
    };

    store.set_state(patch).await;
    let snapshot = Value::Object(store.snapshot());
    hub.broadcast("state-changed", snapshot.clone());
    Ok(snapshot)
}

/// Broadcast an increasing `progress` counter every `interval`
pub fn spawn_progress(bridge: Arc<CommandBridge>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut progress: u64 = 1;
        loop {
            ticker.tick().await;
            progress += 1;
            match bridge.broadcast("progress", json!(progress)) {
                Ok(recipients) => debug!(progress, recipients, "Progress broadcast"),
                Err(e) => warn!(error = %e, "Progress broadcast failed"),
            }
        }
    })
}
