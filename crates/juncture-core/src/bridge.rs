//! Command Bridge - correlates inbound commands with their replies
//!
//! A peer sends a frame named after a registered command. The bridge runs
//! the handler on its own task and emits exactly one reply to that peer:
//! `<command>-result` with the handler's value, or `<command>-error` with
//! `{"message": ...}` if the handler failed.

use crate::error::{Error, Result};
use crate::hub::{Hub, Peer};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;
use juncture_protocol::Frame;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Error type handlers may fail with; only its text reaches the peer
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one handler invocation
pub type HandlerResult = std::result::Result<Value, BoxError>;

/// An asynchronous command handler
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn call(&self, args: Value) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, args: Value) -> HandlerResult {
        (self)(args).await
    }
}

/// Registry of named commands plus broadcast access to the hub
pub struct CommandBridge {
    /// Current handler per command name, looked up at invocation time
    handlers: DashMap<String, Arc<dyn CommandHandler>>,
    hub: Arc<Hub>,
}

impl CommandBridge {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            handlers: DashMap::new(),
            hub,
        }
    }

    /// Bind `handler` to `name` for every connection, current and future.
    ///
    /// Registering an existing name replaces its handler everywhere.
    pub fn register_handler<H: CommandHandler>(
        &self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidCommandName(name));
        }

        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            info!(command = %name, "Replaced command handler");
        } else {
            debug!(command = %name, "Registered command handler");
        }
        Ok(())
    }

    /// Remove the handler for `name`. Later invocations are dropped.
    pub fn unregister_handler(&self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// Registered command names, sorted
    pub fn commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Invoke the handler for `command` on behalf of `peer`.
    ///
    /// Returns the task that will emit the reply, or `None` if no handler
    /// is registered, in which case the message is dropped without reply.
    pub fn dispatch(
        &self,
        peer: Arc<dyn Peer>,
        command: &str,
        args: Value,
    ) -> Option<JoinHandle<()>> {
        let handler = match self.handlers.get(command) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!(client = %peer.id(), command = %command, "No handler registered, dropping");
                return None;
            }
        };

        let command = command.to_string();
        Some(tokio::spawn(async move {
            let reply = match AssertUnwindSafe(handler.call(args)).catch_unwind().await {
                Ok(Ok(data)) => Frame::result(&command, data),
                Ok(Err(e)) => {
                    error!(client = %peer.id(), command = %command, error = %e, "Error handling command");
                    Frame::error(&command, e.to_string())
                }
                Err(_) => {
                    error!(client = %peer.id(), command = %command, "Command handler panicked");
                    Frame::error(&command, "handler panicked")
                }
            };

            if !peer.emit(&reply) {
                debug!(client = %peer.id(), command = %command, "Peer gone before reply");
            }
        }))
    }

    /// Emit `event` with `data` to every connected peer
    pub fn broadcast(&self, event: &str, data: Value) -> Result<usize> {
        if event.is_empty() {
            return Err(Error::InvalidEventName(event.to_string()));
        }
        Ok(self.hub.broadcast(event, data))
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::tests::RecordingPeer;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn pong(_args: Value) -> HandlerResult {
        Ok(json!("pong"))
    }

    async fn boom(_args: Value) -> HandlerResult {
        Err("boom".into())
    }

    async fn echo(args: Value) -> HandlerResult {
        Ok(args)
    }

    fn bridge() -> CommandBridge {
        CommandBridge::new(Arc::new(Hub::new()))
    }

    #[tokio::test]
    async fn test_result_goes_to_caller_only() {
        let bridge = bridge();
        bridge.register_handler("ping", pong).unwrap();

        let caller = RecordingPeer::new("caller");
        let other = RecordingPeer::new("other");
        bridge.hub().connect(caller.clone());
        bridge.hub().connect(other.clone());

        bridge
            .dispatch(caller.clone(), "ping", json!({ "any": "payload" }))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(caller.frames(), vec![Frame::new("ping-result", json!("pong"))]);
        assert!(other.frames().is_empty());
    }

    #[tokio::test]
    async fn test_failure_becomes_error_reply() {
        let bridge = bridge();
        bridge.register_handler("fail", boom).unwrap();

        let caller = RecordingPeer::new("caller");
        bridge.dispatch(caller.clone(), "fail", Value::Null).unwrap().await.unwrap();

        assert_eq!(
            caller.frames(),
            vec![Frame::new("fail-error", json!({ "message": "boom" }))]
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_still_replies() {
        let bridge = bridge();
        bridge
            .register_handler("count", |args: Value| async move {
                let n = args["n"].as_u64().unwrap();
                Ok::<Value, BoxError>(json!(n + 1))
            })
            .unwrap();

        let caller = RecordingPeer::new("caller");
        bridge.dispatch(caller.clone(), "count", Value::Null).unwrap().await.unwrap();
        bridge.dispatch(caller.clone(), "count", json!({ "n": 1 })).unwrap().await.unwrap();

        assert_eq!(
            caller.frames(),
            vec![
                Frame::new("count-error", json!({ "message": "handler panicked" })),
                Frame::new("count-result", json!(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_args_reach_handler() {
        let bridge = bridge();
        bridge.register_handler("echo", echo).unwrap();

        let caller = RecordingPeer::new("caller");
        let args = json!({ "nested": [1, { "two": 2 }] });
        bridge.dispatch(caller.clone(), "echo", args.clone()).unwrap().await.unwrap();

        assert_eq!(caller.frames(), vec![Frame::new("echo-result", args)]);
    }

    #[tokio::test]
    async fn test_commands_are_isolated() {
        let bridge = bridge();
        let y_calls = Arc::new(AtomicUsize::new(0));

        bridge.register_handler("x", pong).unwrap();
        let counter = y_calls.clone();
        bridge
            .register_handler("y", move |_args: Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<Value, BoxError>(json!("y")) }
            })
            .unwrap();

        let caller = RecordingPeer::new("caller");
        bridge.dispatch(caller.clone(), "x", Value::Null).unwrap().await.unwrap();

        assert_eq!(y_calls.load(Ordering::SeqCst), 0);
        assert_eq!(caller.events(), vec!["x-result".to_string()]);
    }

    #[tokio::test]
    async fn test_unregistered_command_is_dropped() {
        let bridge = bridge();
        let caller = RecordingPeer::new("caller");

        assert!(bridge.dispatch(caller.clone(), "nope", Value::Null).is_none());
        assert!(caller.frames().is_empty());
    }

    #[tokio::test]
    async fn test_reregistration_applies_to_existing_connections() {
        let bridge = bridge();
        let caller = RecordingPeer::new("caller");
        bridge.hub().connect(caller.clone());

        bridge.register_handler("cmd", pong).unwrap();
        bridge.dispatch(caller.clone(), "cmd", Value::Null).unwrap().await.unwrap();

        bridge.register_handler("cmd", boom).unwrap();
        bridge.dispatch(caller.clone(), "cmd", Value::Null).unwrap().await.unwrap();

        assert_eq!(
            caller.frames(),
            vec![
                Frame::new("cmd-result", json!("pong")),
                Frame::new("cmd-error", json!({ "message": "boom" })),
            ]
        );
        assert_eq!(bridge.commands(), vec!["cmd".to_string()]);
    }

    #[tokio::test]
    async fn test_unregister_handler() {
        let bridge = bridge();
        bridge.register_handler("ping", pong).unwrap();

        assert!(bridge.unregister_handler("ping"));
        assert!(!bridge.unregister_handler("ping"));
        assert!(bridge.dispatch(RecordingPeer::new("c"), "ping", Value::Null).is_none());
    }

    #[tokio::test]
    async fn test_overlapping_invocations_each_reply() {
        let bridge = bridge();
        bridge
            .register_handler("slow", |args: Value| async move {
                let ms = args.as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<Value, BoxError>(json!(ms))
            })
            .unwrap();

        let caller = RecordingPeer::new("caller");
        let first = bridge.dispatch(caller.clone(), "slow", json!(50)).unwrap();
        let second = bridge.dispatch(caller.clone(), "slow", json!(0)).unwrap();
        first.await.unwrap();
        second.await.unwrap();

        let mut payloads: Vec<Value> = caller.frames().into_iter().map(|f| f.data).collect();
        payloads.sort_by_key(|v| v.as_u64());
        assert_eq!(payloads, vec![json!(0), json!(50)]);
        assert_eq!(caller.events(), vec!["slow-result".to_string(), "slow-result".to_string()]);
    }

    #[tokio::test]
    async fn test_broadcast_fan_out() {
        let bridge = bridge();
        let peers: Vec<_> = ["a", "b", "c"].iter().map(|id| RecordingPeer::new(id)).collect();
        for peer in &peers {
            bridge.hub().connect(peer.clone());
        }

        assert_eq!(bridge.broadcast("tick", json!(5)).unwrap(), 3);

        let late = RecordingPeer::new("d");
        bridge.hub().connect(late.clone());

        for peer in &peers {
            assert_eq!(peer.frames(), vec![Frame::new("tick", json!(5))]);
        }
        assert!(late.frames().is_empty());
    }

    #[test]
    fn test_empty_names_rejected() {
        let bridge = bridge();
        assert!(matches!(
            bridge.register_handler("", pong),
            Err(Error::InvalidCommandName(_))
        ));
        assert!(matches!(
            bridge.broadcast("", Value::Null),
            Err(Error::InvalidEventName(_))
        ));
    }
}
