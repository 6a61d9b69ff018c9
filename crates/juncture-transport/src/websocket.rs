//! WebSocket transport for Juncture

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use juncture_core::{CommandBridge, ConnectionId};
use juncture_protocol::{Frame, MAX_FRAME_SIZE};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use crate::error::TransportError;
use crate::handler::ConnectionHandler;
use crate::peer::{WsPeer, OUTBOUND_CAPACITY};

/// WebSocket server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Largest accepted inbound message, in bytes
    pub max_message_size: usize,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_message_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: Some(self.max_message_size),
            max_frame_size: Some(self.max_message_size),
            ..Default::default()
        }
    }
}

/// WebSocket Server for Juncture
pub struct WebSocketServer {
    bridge: Arc<CommandBridge>,
    config: ServerConfig,
    client_counter: AtomicU64,
}

impl WebSocketServer {
    pub fn new(bridge: Arc<CommandBridge>, config: ServerConfig) -> Self {
        Self {
            bridge,
            config,
            client_counter: AtomicU64::new(0),
        }
    }

    /// Bind the configured address and serve until the listener fails
    pub async fn run(&self) -> Result<(), TransportError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind the configured address without accepting connections yet
    pub async fn bind(&self) -> Result<TcpListener, TransportError> {
        Ok(TcpListener::bind(self.config.addr).await?)
    }

    /// Serve connections accepted on `listener`
    pub async fn serve(&self, listener: TcpListener) -> Result<(), TransportError> {
        info!(addr = %listener.local_addr()?, "Juncture WebSocket server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let client_id = ConnectionId::new(format!(
                        "ws:{}:{}",
                        peer_addr,
                        self.client_counter.fetch_add(1, Ordering::Relaxed)
                    ));
                    let bridge = self.bridge.clone();
                    let config = self.config.clone();

                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, client_id.clone(), bridge, config).await {
                            error!(client = %client_id, error = %e, "WebSocket connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        client_id: ConnectionId,
        bridge: Arc<CommandBridge>,
        config: ServerConfig,
    ) -> Result<(), TransportError> {
        let ws_stream = accept_async_with_config(stream, Some(config.websocket_config())).await?;
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let peer = Arc::new(WsPeer::new(client_id.clone(), tx));

        bridge.hub().connect(peer.clone());
        let handler = ConnectionHandler::new(peer, bridge.clone(), config.max_message_size);

        let result = Self::pump(ws_stream, &client_id, &handler, rx).await;

        bridge.hub().disconnect(&client_id);
        result
    }

    /// Move messages between the socket and the bridge until the peer leaves
    async fn pump(
        ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
        client_id: &ConnectionId,
        handler: &ConnectionHandler,
        mut outbound: mpsc::Receiver<Frame>,
    ) -> Result<(), TransportError> {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                // Inbound commands
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            handler.process(&text);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            handler.process_binary(&data);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(client = %client_id, "WebSocket client disconnected");
                            return Ok(());
                        }
                        Some(Ok(_)) => {
                            // Ignore other message types
                        }
                        Some(Err(e)) => {
                            error!(client = %client_id, error = %e, "WebSocket read error");
                            return Ok(());
                        }
                    }
                }

                // Replies and broadcasts
                frame = outbound.recv() => {
                    match frame {
                        Some(frame) => {
                            debug!(client = %client_id, event = %frame.event, "Sending frame");
                            write.send(Message::Text(frame.encode())).await?;
                        }
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juncture_core::{BoxError, HandlerResult, Hub};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn pong(_args: Value) -> HandlerResult {
        Ok(json!("pong"))
    }

    async fn start() -> (Arc<CommandBridge>, SocketAddr) {
        let bridge = Arc::new(CommandBridge::new(Arc::new(Hub::new())));
        bridge.register_handler("ping", pong).unwrap();
        bridge
            .register_handler("fail", |_args: Value| async {
                Err::<Value, BoxError>("boom".into())
            })
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = WebSocketServer::new(bridge.clone(), ServerConfig::new(addr));
        tokio::spawn(async move { server.serve(listener).await });

        (bridge, addr)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        client
    }

    async fn send(client: &mut Client, event: &str, data: Value) {
        let text = Frame::new(event, data).encode();
        client.send(Message::Text(text)).await.unwrap();
    }

    async fn next_frame(client: &mut Client) -> Frame {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for frame")
                .unwrap()
                .unwrap();
            if let Message::Text(text) = msg {
                return Frame::decode(&text, MAX_FRAME_SIZE).unwrap();
            }
        }
    }

    async fn wait_for_peers(bridge: &CommandBridge, count: usize) {
        for _ in 0..200 {
            if bridge.hub().len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} peers, have {}", count, bridge.hub().len());
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let (_bridge, addr) = start().await;
        let mut client = connect(addr).await;

        send(&mut client, "ping", json!({ "x": 1 })).await;
        assert_eq!(next_frame(&mut client).await, Frame::new("ping-result", json!("pong")));

        send(&mut client, "fail", Value::Null).await;
        assert_eq!(
            next_frame(&mut client).await,
            Frame::new("fail-error", json!({ "message": "boom" }))
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_no_reply() {
        let (_bridge, addr) = start().await;
        let mut client = connect(addr).await;

        client.send(Message::Text("garbage".into())).await.unwrap();
        send(&mut client, "unknown", Value::Null).await;
        send(&mut client, "ping", Value::Null).await;

        assert_eq!(next_frame(&mut client).await.event, "ping-result");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_clients() {
        let (bridge, addr) = start().await;
        let mut first = connect(addr).await;
        let mut second = connect(addr).await;
        wait_for_peers(&bridge, 2).await;

        assert_eq!(bridge.broadcast("progress", json!(7)).unwrap(), 2);

        assert_eq!(next_frame(&mut first).await, Frame::new("progress", json!(7)));
        assert_eq!(next_frame(&mut second).await, Frame::new("progress", json!(7)));
    }

    #[tokio::test]
    async fn test_bind_to_taken_port_fails() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let bridge = Arc::new(CommandBridge::new(Arc::new(Hub::new())));
        let server = WebSocketServer::new(bridge, ServerConfig::new(addr));

        assert!(matches!(server.bind().await, Err(TransportError::Io(_))));
        assert!(server.run().await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_leaves_hub() {
        let (bridge, addr) = start().await;
        let mut client = connect(addr).await;
        wait_for_peers(&bridge, 1).await;

        client.close(None).await.unwrap();
        wait_for_peers(&bridge, 0).await;
    }
}
